use std::sync::Arc;

use conflux_types::Platform;

use crate::adapter::NodeAdapter;
use crate::error::{NodeError, NodeResult};

/// The set of nodes targeted by one merge, at most one per platform.
#[derive(Clone)]
pub struct NodeGroup {
    name: String,
    nodes: Vec<Arc<dyn NodeAdapter>>,
}

impl NodeGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Add a node. Fails if the platform is already represented.
    pub fn add(&mut self, node: Arc<dyn NodeAdapter>) -> NodeResult<()> {
        let platform = node.platform();
        if self.get(platform).is_some() {
            return Err(NodeError::DuplicatePlatform(platform));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Builder form of [`Self::add`].
    pub fn with_node(mut self, node: Arc<dyn NodeAdapter>) -> NodeResult<Self> {
        self.add(node)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn NodeAdapter>> {
        self.nodes.iter().find(|n| n.platform() == platform)
    }

    pub fn nodes(&self) -> &[Arc<dyn NodeAdapter>] {
        &self.nodes
    }

    /// Platforms in canonical order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut out: Vec<Platform> = self.nodes.iter().map(|n| n.platform()).collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl std::fmt::Debug for NodeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeGroup")
            .field("name", &self.name)
            .field("platforms", &self.platforms())
            .finish()
    }
}
