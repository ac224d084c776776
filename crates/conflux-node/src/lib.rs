//! Node adapter contract for Conflux.
//!
//! Every platform taking part in a merge is reached through a
//! [`NodeAdapter`]: it accepts checkpoint/resume commands, exports its
//! domain-keyed state, and offers a best-effort emergency resume path.
//! How a node implements these (HTTP, in-process, message queue) is its own
//! business; the merge treats each node as an opaque, independently
//! synchronized dependency.

pub mod adapter;
pub mod error;
pub mod group;
pub mod memory;

pub use adapter::NodeAdapter;
pub use error::{NodeError, NodeResult};
pub use group::NodeGroup;
pub use memory::{FaultPlan, InMemoryNode};
