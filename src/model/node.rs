use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::strategy::StrategyFlags;

// ---------------------------------------------------------------------------
// NodeId: kind-tagged identity shared by every node in the graph
// ---------------------------------------------------------------------------

/// The three kinds of vertex the graph knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Address,
    Identity,
    Transaction,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Address => "Address",
            NodeKind::Identity => "Identity",
            NodeKind::Transaction => "Transaction",
        };
        f.write_str(name)
    }
}

/// Globally unique node identifier: the node kind plus its natural key.
///
/// Two nodes of different kinds can never collide, even when their keys are
/// the same string. Displays as `<Kind>:<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum NodeId {
    Address(String),
    Identity(String),
    Transaction(String),
}

impl NodeId {
    pub fn address(hash: impl Into<String>) -> Self {
        NodeId::Address(hash.into())
    }

    pub fn identity(name: impl Into<String>) -> Self {
        NodeId::Identity(name.into())
    }

    pub fn transaction(txid: impl Into<String>) -> Self {
        NodeId::Transaction(txid.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Address(_) => NodeKind::Address,
            NodeId::Identity(_) => NodeKind::Identity,
            NodeId::Transaction(_) => NodeKind::Transaction,
        }
    }

    /// The natural key: address hash, identity name or txid.
    pub fn key(&self) -> &str {
        match self {
            NodeId::Address(k) | NodeId::Identity(k) | NodeId::Transaction(k) => k,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}

// ---------------------------------------------------------------------------
// Metadata: the mutable side channel attached to addresses and transactions
// ---------------------------------------------------------------------------

/// Per-node mutable state. Heuristic output lives under `strategy`; anything
/// else a collaborator wants to attach goes into the open `extra` bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Set once every known transaction touching the address has been fetched.
    #[serde(default)]
    pub expanded: bool,
    #[serde(default, skip_serializing_if = "StrategyFlags::is_empty")]
    pub strategy: StrategyFlags,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Node variants
// ---------------------------------------------------------------------------

/// An on-chain address, keyed by its base58 hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressNode {
    pub id: NodeId,
    pub hash: String,
    pub metadata: Metadata,
}

impl AddressNode {
    pub fn new(hash: impl Into<String>) -> Self {
        let hash = hash.into();
        Self {
            id: NodeId::address(hash.clone()),
            hash,
            metadata: Metadata::default(),
        }
    }
}

/// A human-assigned identity believed to control one or more addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityNode {
    pub id: NodeId,
    pub name: String,
    pub extra: Option<String>,
}

impl IdentityNode {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: NodeId::identity(name.clone()),
            name,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// A confirmed transaction linking input and output addresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionNode {
    pub id: NodeId,
    pub txid: String,
    /// Milliseconds since the UNIX epoch, as delivered by the fetch collaborator.
    pub date: i64,
    pub blockhash: String,
    pub metadata: Metadata,
}

impl TransactionNode {
    pub fn new(txid: impl Into<String>, date: i64, blockhash: impl Into<String>) -> Self {
        let txid = txid.into();
        Self {
            id: NodeId::transaction(txid.clone()),
            txid,
            date,
            blockhash: blockhash.into(),
            metadata: Metadata::default(),
        }
    }

    /// `None` when the raw millisecond value is outside chrono's range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.date)
    }
}

/// A vertex of the privacy graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Address(AddressNode),
    Identity(IdentityNode),
    Transaction(TransactionNode),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Address(n) => &n.id,
            Node::Identity(n) => &n.id,
            Node::Transaction(n) => &n.id,
        }
    }

    /// Identities carry no metadata.
    pub fn metadata_mut(&mut self) -> Option<&mut Metadata> {
        match self {
            Node::Address(n) => Some(&mut n.metadata),
            Node::Transaction(n) => Some(&mut n.metadata),
            Node::Identity(_) => None,
        }
    }

    pub fn as_address(&self) -> Option<&AddressNode> {
        match self {
            Node::Address(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_identity(&self) -> Option<&IdentityNode> {
        match self {
            Node::Identity(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&TransactionNode> {
        match self {
            Node::Transaction(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_namespaced_by_kind() {
        let addr = NodeId::address("abc");
        let ident = NodeId::identity("abc");
        let tx = NodeId::transaction("abc");
        assert_ne!(addr, ident);
        assert_ne!(ident, tx);
        assert_eq!(addr.to_string(), "Address:abc");
        assert_eq!(ident.to_string(), "Identity:abc");
        assert_eq!(tx.to_string(), "Transaction:abc");
    }

    #[test]
    fn test_metadata_serializes_strategy_under_camel_case() {
        let mut node = AddressNode::new("1Abc");
        node.metadata.expanded = true;
        node
            .metadata
            .extra
            .insert("note".to_string(), "exchange hot wallet".into());
        let json = serde_json::to_value(&node.metadata).unwrap();
        assert_eq!(json["expanded"], true);
        assert_eq!(json["note"], "exchange hot wallet");
        assert!(json.get("strategy").is_none());
    }

    #[test]
    fn test_transaction_timestamp_from_millis() {
        let tx = TransactionNode::new("t1", 1_400_000_000_000, "b1");
        let ts = tx.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_400_000_000);
    }
}
