//! Node selectors: which node writes a given index

use std::sync::Arc;

use super::channel::{ClusterNode, NodeAddress};

pub trait NodeSelector: Send + Sync {
    /// Whether this node applies work for `index_name`
    fn is_index_owner(&self, index_name: &str) -> bool;

    /// Node work should be forwarded to; `None` means unknown (broadcast)
    fn owner(&self, index_name: &str) -> Option<NodeAddress>;

    /// Called once at processor start-up
    fn on_start(&self, _index_name: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Master,
    Slave,
    Auto,
}

impl SelectorKind {
    pub fn build(self, node: Arc<ClusterNode>) -> Box<dyn NodeSelector> {
        match self {
            SelectorKind::Master => Box::new(MasterNodeSelector { node }),
            SelectorKind::Slave => Box::new(SlaveNodeSelector { node }),
            SelectorKind::Auto => Box::new(AutoNodeSelector { node }),
        }
    }
}

/// This node always writes and claims the index on the channel
pub struct MasterNodeSelector {
    node: Arc<ClusterNode>,
}

impl NodeSelector for MasterNodeSelector {
    fn is_index_owner(&self, _index_name: &str) -> bool {
        true
    }

    fn owner(&self, _index_name: &str) -> Option<NodeAddress> {
        Some(self.node.address().clone())
    }

    fn on_start(&self, index_name: &str) {
        self.node.channel().claim_master(index_name, self.node.address());
    }
}

/// This node never writes; forwards to the claimed master, else broadcasts
pub struct SlaveNodeSelector {
    node: Arc<ClusterNode>,
}

impl NodeSelector for SlaveNodeSelector {
    fn is_index_owner(&self, _index_name: &str) -> bool {
        false
    }

    fn owner(&self, index_name: &str) -> Option<NodeAddress> {
        self.node.channel().master_of(index_name)
    }
}

/// Lowest member address writes; re-evaluated on every call
pub struct AutoNodeSelector {
    node: Arc<ClusterNode>,
}

impl NodeSelector for AutoNodeSelector {
    fn is_index_owner(&self, index_name: &str) -> bool {
        self.owner(index_name).as_ref() == Some(self.node.address())
    }

    fn owner(&self, _index_name: &str) -> Option<NodeAddress> {
        self.node.channel().members().into_iter().next()
    }
}
