//! Node fan-out for Conflux.
//!
//! Every node-facing operation (checkpoint broadcast, capture, resume) is
//! issued to all nodes concurrently and joined with a settle-all join: one
//! node's failure or silence never cancels or blocks the others. Individual
//! failures are recorded in the returned reports, never retried.

pub mod capture;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod recovery;
pub mod types;

pub use capture::StateCapturer;
pub use config::SyncConfig;
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use recovery::RecoveryManager;
pub use types::{CaptureReport, CheckpointReport, NodeFailure, ResumeReport};
