use conflux_types::TypeError;

/// Errors that can occur while detecting, resolving, or unifying.
///
/// None of these are the absorbed per-conflict failures: a strategy that
/// cannot decide returns an unsuccessful `Resolution`, not an error.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The requested strategy is not registered.
    #[error("unknown resolution strategy: {0}")]
    UnknownStrategy(String),

    /// A resolution refers to a conflict that was not detected.
    #[error("resolution references unknown conflict {0}")]
    UnknownConflict(String),

    /// A conflict reached unification without exactly one resolution.
    #[error("conflict {conflict_id} has {count} resolutions, expected exactly one")]
    ResolutionCount { conflict_id: String, count: usize },

    /// The snapshot could not be sealed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] TypeError),
}

pub type MergeResult<T> = Result<T, MergeError>;
