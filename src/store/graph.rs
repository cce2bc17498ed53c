use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::error::{PrivacyError, PrivacyResult};
use crate::model::edge::{Edge, EdgeId, EdgeKind};
use crate::model::node::{AddressNode, IdentityNode, Metadata, Node, NodeId, TransactionNode};
use crate::store::observer::GraphObserver;

const NO_EDGES: &[usize] = &[];

// ---------------------------------------------------------------------------
// Graph: in-memory node/edge store with per-node incidence lists
// ---------------------------------------------------------------------------

/// Authoritative storage for addresses, identities, transactions and the
/// edges between them.
///
/// Nodes are keyed by [`NodeId`], so kinds never collide. Every edge is kept
/// once in insertion order; both endpoints index it by position, which is
/// what [`Graph::neighbors_by_kind`] walks.
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    addresses: Vec<NodeId>,
    identities: Vec<NodeId>,
    transactions: Vec<NodeId>,
    edges: Vec<Edge>,
    incidence: HashMap<NodeId, Vec<usize>>,
    observers: Vec<Box<dyn GraphObserver>>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            addresses: Vec::new(),
            identities: Vec::new(),
            transactions: Vec::new(),
            edges: Vec::new(),
            incidence: HashMap::new(),
            observers: Vec::new(),
        }
    }

    /// Register a subscriber for mutation events.
    pub fn subscribe(&mut self, observer: Box<dyn GraphObserver>) {
        self.observers.push(observer);
    }

    // -- mutation -----------------------------------------------------------

    /// Add an address if absent. Returns `true` when a node was created.
    pub fn add_address(&mut self, hash: &str) -> bool {
        let id = NodeId::address(hash);
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.insert_node(Node::Address(AddressNode::new(hash)));
        self.addresses.push(id.clone());
        debug!(address = hash, "created address node");

        if let Some(Node::Address(node)) = self.nodes.get(&id) {
            for observer in self.observers.iter_mut() {
                observer.on_address_added(node);
            }
        }
        true
    }

    /// Add an identity if absent. Returns `true` when a node was created.
    pub fn add_identity(&mut self, name: &str) -> bool {
        self.add_identity_node(IdentityNode::new(name))
    }

    /// Add a prepared identity node (e.g. one carrying `extra`) if its name is new.
    pub fn add_identity_node(&mut self, node: IdentityNode) -> bool {
        let id = node.id.clone();
        if self.nodes.contains_key(&id) {
            return false;
        }
        debug!(identity = %node.name, "created identity node");
        self.insert_node(Node::Identity(node));
        self.identities.push(id.clone());

        if let Some(Node::Identity(node)) = self.nodes.get(&id) {
            for observer in self.observers.iter_mut() {
                observer.on_identity_added(node);
            }
        }
        true
    }

    /// Add a transaction node if its txid is new. An existing node is never
    /// replaced. Returns `true` when a node was created.
    pub fn add_transaction(&mut self, node: TransactionNode) -> bool {
        let id = node.id.clone();
        if self.nodes.contains_key(&id) {
            return false;
        }
        debug!(txid = %node.txid, "created transaction node");
        self.insert_node(Node::Transaction(node));
        self.transactions.push(id.clone());

        if let Some(Node::Transaction(node)) = self.nodes.get(&id) {
            for observer in self.observers.iter_mut() {
                observer.on_transaction_added(node);
            }
        }
        true
    }

    /// Link an identity to an address it is believed to control.
    ///
    /// Fails with [`PrivacyError::NotFound`] naming the missing endpoint; no
    /// edge is created in that case. A second ownership edge for the same
    /// address is allowed.
    pub fn associate_address(
        &mut self,
        address: &str,
        identity: &str,
        annotations: Option<String>,
    ) -> PrivacyResult<EdgeId> {
        let address_id = NodeId::address(address);
        let identity_id = NodeId::identity(identity);
        if !self.nodes.contains_key(&address_id) {
            return Err(PrivacyError::address_not_found(address));
        }
        if !self.nodes.contains_key(&identity_id) {
            return Err(PrivacyError::identity_not_found(identity));
        }

        let edge = Edge::new(EdgeKind::Ownership, identity_id, address_id)
            .with_annotations(annotations);
        self.add_edge(edge)
    }

    /// Store an edge. Both endpoints must already exist.
    pub fn add_edge(&mut self, edge: Edge) -> PrivacyResult<EdgeId> {
        for endpoint in [&edge.from_id, &edge.to_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(PrivacyError::DanglingReference {
                    from: edge.from_id.clone(),
                    to: edge.to_id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }

        let index = self.edges.len();
        let id = edge.id();
        self.incidence
            .entry(edge.from_id.clone())
            .or_default()
            .push(index);
        if edge.to_id != edge.from_id {
            self.incidence.entry(edge.to_id.clone()).or_default().push(index);
        }
        self.edges.push(edge);

        let stored = &self.edges[index];
        for observer in self.observers.iter_mut() {
            observer.on_edge_added(stored);
        }
        Ok(id)
    }

    /// Tell subscribers that a batch of additions is complete.
    pub fn finished_adding(&mut self) {
        for observer in self.observers.iter_mut() {
            observer.on_finished_adding();
        }
    }

    /// Mutable access to an address's or transaction's metadata.
    pub fn metadata_mut(&mut self, id: &NodeId) -> Option<&mut Metadata> {
        self.nodes.get_mut(id).and_then(Node::metadata_mut)
    }

    /// Metadata of every address and transaction, in no particular order.
    pub fn metadata_iter_mut(&mut self) -> impl Iterator<Item = &mut Metadata> + '_ {
        self.nodes.values_mut().filter_map(Node::metadata_mut)
    }

    fn insert_node(&mut self, node: Node) {
        let id = node.id().clone();
        self.incidence.entry(id.clone()).or_default();
        self.nodes.insert(id, node);
    }

    // -- lookup -------------------------------------------------------------

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_address_node(&self, hash: &str) -> Option<&AddressNode> {
        self.nodes
            .get(&NodeId::address(hash))
            .and_then(Node::as_address)
    }

    pub fn get_identity_node(&self, name: &str) -> Option<&IdentityNode> {
        self.nodes
            .get(&NodeId::identity(name))
            .and_then(Node::as_identity)
    }

    pub fn get_transaction_by_id(&self, txid: &str) -> Option<&TransactionNode> {
        self.nodes
            .get(&NodeId::transaction(txid))
            .and_then(Node::as_transaction)
    }

    /// Edges of `kind` touching `node`, paired with the node at the other
    /// end, in edge-insertion order. Unknown nodes yield nothing.
    pub fn neighbors_by_kind(&self, node: &NodeId, kind: EdgeKind) -> Neighbors<'_> {
        let (origin, incident) = match self.incidence.get_key_value(node) {
            Some((origin, incident)) => (Some(origin), incident.iter()),
            None => (None, NO_EDGES.iter()),
        };
        Neighbors {
            edges: &self.edges,
            nodes: &self.nodes,
            origin,
            incident,
            kind,
        }
    }

    /// The first identity (lowest edge-insertion order) owning `hash`.
    pub fn identity_by_address(&self, hash: &str) -> Option<&IdentityNode> {
        self.neighbors_by_kind(&NodeId::address(hash), EdgeKind::Ownership)
            .find_map(|(_, node)| node.as_identity())
    }

    /// Every identity owning `hash`, in edge-insertion order.
    pub fn identities_by_address(&self, hash: &str) -> Vec<&IdentityNode> {
        self.neighbors_by_kind(&NodeId::address(hash), EdgeKind::Ownership)
            .filter_map(|(_, node)| node.as_identity())
            .collect()
    }

    /// Addresses in insertion order.
    pub fn addresses(&self) -> impl Iterator<Item = &AddressNode> + '_ {
        self.addresses
            .iter()
            .filter_map(|id| self.nodes.get(id).and_then(Node::as_address))
    }

    /// Identities in insertion order.
    pub fn identities(&self) -> impl Iterator<Item = &IdentityNode> + '_ {
        self.identities
            .iter()
            .filter_map(|id| self.nodes.get(id).and_then(Node::as_identity))
    }

    /// Transactions in insertion order.
    pub fn transactions(&self) -> impl Iterator<Item = &TransactionNode> + '_ {
        self.transactions
            .iter()
            .filter_map(|id| self.nodes.get(id).and_then(Node::as_transaction))
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            addresses: self.addresses.len(),
            identities: self.identities.len(),
            transactions: self.transactions.len(),
            edges: self.edges.len(),
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("stats", &self.stats())
            .field("observers", &self.observers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Neighbors: restartable iteration over (edge, other node) pairs
// ---------------------------------------------------------------------------

/// Lazy iterator returned by [`Graph::neighbors_by_kind`].
///
/// Cloning yields an independent iterator from the same position, so a
/// fresh clone taken before iteration restarts the walk.
#[derive(Clone)]
pub struct Neighbors<'g> {
    edges: &'g [Edge],
    nodes: &'g HashMap<NodeId, Node>,
    origin: Option<&'g NodeId>,
    incident: std::slice::Iter<'g, usize>,
    kind: EdgeKind,
}

impl<'g> Iterator for Neighbors<'g> {
    type Item = (&'g Edge, &'g Node);

    fn next(&mut self) -> Option<Self::Item> {
        let origin = self.origin?;
        for &index in self.incident.by_ref() {
            let edge = &self.edges[index];
            if edge.kind != self.kind {
                continue;
            }
            if let Some(other) = self.nodes.get(edge.other_end(origin)) {
                return Some((edge, other));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub addresses: usize,
    pub identities: usize,
    pub transactions: usize,
    pub edges: usize,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Addresses: {} | Identities: {} | Transactions: {} | Edges: {}",
            self.addresses, self.identities, self.transactions, self.edges
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeKind;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl GraphObserver for Recorder {
        fn on_address_added(&mut self, node: &AddressNode) {
            self.events.lock().unwrap().push(format!("address {}", node.hash));
        }

        fn on_edge_added(&mut self, edge: &Edge) {
            self.events.lock().unwrap().push(format!("edge {}", edge.kind));
        }
    }

    fn make_graph() -> Graph {
        let mut g = Graph::new();
        g.add_address("1A");
        g.add_address("1B");
        g.add_transaction(TransactionNode::new("t1", 0, "b1"));
        g.add_edge(
            Edge::new(EdgeKind::TxInput, NodeId::address("1A"), NodeId::transaction("t1"))
                .with_satoshis(100),
        )
        .unwrap();
        g.add_edge(
            Edge::new(EdgeKind::TxOutput, NodeId::transaction("t1"), NodeId::address("1B"))
                .with_satoshis(90),
        )
        .unwrap();
        g
    }

    #[test]
    fn test_add_address_is_idempotent() {
        let mut g = Graph::new();
        assert!(g.add_address("1A"));
        assert!(!g.add_address("1A"));
        assert!(!g.add_address("1A"));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.addresses().count(), 1);
    }

    #[test]
    fn test_same_key_different_kinds_coexist() {
        let mut g = Graph::new();
        g.add_address("x");
        g.add_identity("x");
        g.add_transaction(TransactionNode::new("x", 0, ""));
        assert_eq!(g.node_count(), 3);
        assert!(g.get_address_node("x").is_some());
        assert!(g.get_identity_node("x").is_some());
        assert!(g.get_transaction_by_id("x").is_some());
    }

    #[test]
    fn test_observers_fire_only_on_creation() {
        let recorder = Recorder::default();
        let mut g = Graph::new();
        g.subscribe(Box::new(recorder.clone()));

        g.add_address("1A");
        g.add_address("1A");
        g.add_identity("Jack");
        g.associate_address("1A", "Jack", None).unwrap();

        assert_eq!(recorder.events(), vec!["address 1A", "edge ownership"]);
    }

    #[test]
    fn test_add_edge_rejects_dangling_reference() {
        let mut g = Graph::new();
        g.add_address("1A");
        let err = g
            .add_edge(Edge::new(
                EdgeKind::TxInput,
                NodeId::address("1A"),
                NodeId::transaction("missing"),
            ))
            .unwrap_err();
        match err {
            PrivacyError::DanglingReference { missing, .. } => {
                assert_eq!(missing, NodeId::transaction("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_associate_unknown_endpoint() {
        let mut g = Graph::new();
        g.add_identity("Jack");
        let err = g.associate_address("1Nope", "Jack", None).unwrap_err();
        assert!(matches!(
            err,
            PrivacyError::NotFound { kind: NodeKind::Address, ref key } if key == "1Nope"
        ));

        g.add_address("1A");
        let err = g.associate_address("1A", "Nobody", None).unwrap_err();
        assert!(matches!(err, PrivacyError::NotFound { kind: NodeKind::Identity, .. }));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_neighbors_by_kind_filters_and_is_restartable() {
        let g = make_graph();
        let tx = NodeId::transaction("t1");

        let inputs = g.neighbors_by_kind(&tx, EdgeKind::TxInput);
        let again = inputs.clone();
        let hashes: Vec<&str> = inputs
            .filter_map(|(_, n)| n.as_address())
            .map(|a| a.hash.as_str())
            .collect();
        assert_eq!(hashes, vec!["1A"]);
        assert_eq!(again.count(), 1);

        let outputs: Vec<_> = g.neighbors_by_kind(&tx, EdgeKind::TxOutput).collect();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0.satoshis, Some(90));

        assert_eq!(
            g.neighbors_by_kind(&NodeId::address("nope"), EdgeKind::TxInput)
                .count(),
            0
        );
    }

    #[test]
    fn test_identity_by_address_takes_first_ownership() {
        let mut g = Graph::new();
        g.add_address("1A");
        g.add_identity("Jack");
        g.add_identity("John");
        assert!(g.identity_by_address("1A").is_none());

        g.associate_address("1A", "Jack", Some("met at conf".into()))
            .unwrap();
        g.associate_address("1A", "John", None).unwrap();

        assert_eq!(g.identity_by_address("1A").unwrap().name, "Jack");
        let all: Vec<&str> = g
            .identities_by_address("1A")
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(all, vec!["Jack", "John"]);
    }

    #[test]
    fn test_every_edge_resolves() {
        let g = make_graph();
        for edge in g.edges() {
            assert!(g.get_node(&edge.from_id).is_some());
            assert!(g.get_node(&edge.to_id).is_some());
        }
        assert_eq!(
            g.stats(),
            GraphStats {
                addresses: 2,
                identities: 0,
                transactions: 1,
                edges: 2
            }
        );
    }
}
