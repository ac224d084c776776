use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown conflict kind: {0}")]
    UnknownConflictKind(String),

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("illegal phase transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
