//! Built-in detection rules.
//!
//! - [`AgentRecordRule`] : runtime vs surface agent records (entity mismatch)
//! - [`TimelineRule`] : mirror vs runtime event timelines (sequence divergence)
//! - [`MoodDriftRule`] : surface vs mirror mood intensity (scalar drift)
//! - [`ValidationRule`] : protocol vs mirror validation outcomes (record disagreement)

pub mod agents;
pub mod mood;
pub mod timeline;
pub mod validations;

pub use agents::AgentRecordRule;
pub use mood::MoodDriftRule;
pub use timeline::TimelineRule;
pub use validations::ValidationRule;
