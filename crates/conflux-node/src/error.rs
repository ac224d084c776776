use conflux_types::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {0} unreachable: {1}")]
    Unreachable(Platform, String),

    #[error("node {platform} rejected command: {reason}")]
    Rejected { platform: Platform, reason: String },

    #[error("node {platform} failed to export state: {reason}")]
    ExportFailed { platform: Platform, reason: String },

    #[error("node {platform} failed to resume: {reason}")]
    ResumeFailed { platform: Platform, reason: String },

    #[error("duplicate node for platform {0}")]
    DuplicatePlatform(Platform),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type NodeResult<T> = Result<T, NodeError>;
