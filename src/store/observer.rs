use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::model::edge::Edge;
use crate::model::node::{AddressNode, IdentityNode, TransactionNode};

// ---------------------------------------------------------------------------
// GraphObserver: change notification for collaborators outside the core
// ---------------------------------------------------------------------------

/// Subscriber interface for graph mutations.
///
/// Every callback has an empty default, so a subscriber implements only the
/// events it cares about. Callbacks run synchronously, in subscription order,
/// right after the mutation they describe has been applied.
pub trait GraphObserver: Send {
    fn on_address_added(&mut self, _node: &AddressNode) {}

    fn on_identity_added(&mut self, _node: &IdentityNode) {}

    fn on_transaction_added(&mut self, _node: &TransactionNode) {}

    fn on_edge_added(&mut self, _edge: &Edge) {}

    /// Fired once after a whole transaction has been ingested.
    fn on_finished_adding(&mut self) {}
}

/// Owned snapshot of a graph mutation, for subscribers living elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    AddressAdded(AddressNode),
    IdentityAdded(IdentityNode),
    TransactionAdded(TransactionNode),
    EdgeAdded(Edge),
    FinishedAdding,
}

/// Logs every mutation at debug level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl GraphObserver for TracingObserver {
    fn on_address_added(&mut self, node: &AddressNode) {
        debug!(address = %node.hash, "address added");
    }

    fn on_identity_added(&mut self, node: &IdentityNode) {
        debug!(identity = %node.name, "identity added");
    }

    fn on_transaction_added(&mut self, node: &TransactionNode) {
        debug!(txid = %node.txid, blockhash = %node.blockhash, "transaction added");
    }

    fn on_edge_added(&mut self, edge: &Edge) {
        debug!(edge = %edge.id(), kind = %edge.kind, satoshis = ?edge.satoshis, "edge added");
    }

    fn on_finished_adding(&mut self) {
        debug!("finished adding transaction");
    }
}

/// Forwards mutations over an unbounded channel, e.g. to a renderer task.
/// A dropped receiver silently disables forwarding.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<GraphEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<GraphEvent>) -> Self {
        Self { tx }
    }

    fn forward(&self, event: GraphEvent) {
        if self.tx.send(event).is_err() {
            debug!("graph event receiver dropped");
        }
    }
}

impl GraphObserver for ChannelObserver {
    fn on_address_added(&mut self, node: &AddressNode) {
        self.forward(GraphEvent::AddressAdded(node.clone()));
    }

    fn on_identity_added(&mut self, node: &IdentityNode) {
        self.forward(GraphEvent::IdentityAdded(node.clone()));
    }

    fn on_transaction_added(&mut self, node: &TransactionNode) {
        self.forward(GraphEvent::TransactionAdded(node.clone()));
    }

    fn on_edge_added(&mut self, edge: &Edge) {
        self.forward(GraphEvent::EdgeAdded(edge.clone()));
    }

    fn on_finished_adding(&mut self) {
        self.forward(GraphEvent::FinishedAdding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut observer = ChannelObserver::new(tx);
        observer.on_address_added(&AddressNode::new("1A"));
        observer.on_finished_adding();

        assert_eq!(
            rx.try_recv().unwrap(),
            GraphEvent::AddressAdded(AddressNode::new("1A"))
        );
        assert_eq!(rx.try_recv().unwrap(), GraphEvent::FinishedAdding);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut observer = ChannelObserver::new(tx);
        observer.on_identity_added(&IdentityNode::new("Jack"));
    }
}
