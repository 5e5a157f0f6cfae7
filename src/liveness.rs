//! Node liveness checks.
//!
//! The driver keeps serving cached values for nodes that stopped
//! responding. These checks gate acquisition so stale values are dropped.

use crate::driver::ControllerDriver;
use crate::network::Network;
use crate::types::NodeId;

impl<D: ControllerDriver> Network<'_, D> {
    /// Returns false if the driver reports the node as failed.
    #[must_use]
    pub fn is_node_connected(&self, node_id: NodeId) -> bool {
        if self.driver().is_node_failed(self.home_id(), node_id) {
            tracing::warn!("node [{}] is failed, discarding its values", node_id);
            return false;
        }
        true
    }

    /// Returns false as soon as one known node is failed.
    #[must_use]
    pub fn are_all_nodes_connected(&self) -> bool {
        self.session()
            .node_ids
            .iter()
            .all(|&node_id| self.is_node_connected(node_id))
    }
}
