//! Merge session orchestration for Conflux.
//!
//! [`MergeOrchestrator`] drives a [`MergeSession`] through its phases:
//!
//! 1. Broadcast a sync checkpoint and wait out the settling window
//! 2. Capture every node's state in parallel
//! 3. Detect and resolve conflicts with the configured strategy
//! 4. Unify into a sealed snapshot
//! 5. Resume every node
//!
//! Any failure that aborts a phase triggers emergency recovery on every
//! node before the error reaches the caller. Sessions are kept in a
//! [`SessionRepository`] for lookup and [`MergeMetrics`].

pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod repository;
pub mod session;

pub use config::OrchestratorConfig;
pub use error::{SessionError, SessionResult};
pub use metrics::MergeMetrics;
pub use orchestrator::MergeOrchestrator;
pub use repository::SessionRepository;
pub use session::{MergeSession, PhaseChange, SessionFailure};
