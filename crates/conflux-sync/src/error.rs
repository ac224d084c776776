use std::time::Duration;

use thiserror::Error;

use crate::types::NodeFailure;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("node group is empty")]
    EmptyGroup,

    #[error("sync window of {0:?} cannot be scheduled")]
    WindowOutOfRange(Duration),

    #[error("no node state could be captured ({} failures)", .0.len())]
    NothingCaptured(Vec<NodeFailure>),
}

pub type SyncResult<T> = Result<T, SyncError>;
