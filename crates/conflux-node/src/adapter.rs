use async_trait::async_trait;
use conflux_types::{CommandAck, ExportOptions, NodeCommand, NodeState, Platform};

use crate::error::NodeResult;

/// Capability interface every participating platform exposes to the merge.
#[async_trait]
pub trait NodeAdapter: Send + Sync {
    /// The platform this node speaks for.
    fn platform(&self) -> Platform;

    /// Deliver a checkpoint or resume command. `Ok` is an acknowledgement.
    async fn receive_command(&self, command: &NodeCommand) -> NodeResult<CommandAck>;

    /// Export the node's current domain-keyed state.
    async fn export_state(&self, options: &ExportOptions) -> NodeResult<NodeState>;

    /// Fallback resume path, independent of normal command handling.
    async fn emergency_resume(&self) -> NodeResult<()>;
}
