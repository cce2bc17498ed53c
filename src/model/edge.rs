use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::node::NodeId;

// ---------------------------------------------------------------------------
// Edge: directed, typed relations between graph nodes
// ---------------------------------------------------------------------------

/// A directed edge of the privacy graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Source node (edge goes FROM this node).
    pub from_id: NodeId,
    /// Target node (edge goes TO this node).
    pub to_id: NodeId,
    pub kind: EdgeKind,
    /// Amount moved along a transaction edge, in satoshis.
    pub satoshis: Option<u64>,
    /// Free-form notes on an ownership edge.
    pub annotations: Option<String>,
}

impl Edge {
    pub fn new(kind: EdgeKind, from_id: NodeId, to_id: NodeId) -> Self {
        Self {
            from_id,
            to_id,
            kind,
            satoshis: None,
            annotations: None,
        }
    }

    pub fn with_satoshis(mut self, satoshis: u64) -> Self {
        self.satoshis = Some(satoshis);
        self
    }

    pub fn with_annotations(mut self, annotations: Option<String>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Display id; not unique across edge kinds between the same endpoints.
    pub fn id(&self) -> EdgeId {
        EdgeId {
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
        }
    }

    /// The endpoint that is not `node`. Self-loops return `node` itself.
    pub fn other_end(&self, node: &NodeId) -> &NodeId {
        if &self.from_id == node {
            &self.to_id
        } else {
            &self.from_id
        }
    }
}

/// Edge identifier rendered as `Edge:<fromId>:<toId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    pub from_id: NodeId,
    pub to_id: NodeId,
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge:{}:{}", self.from_id, self.to_id)
    }
}

// ---------------------------------------------------------------------------
// EdgeKind: categories of relationships
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Address spends into a transaction.
    TxInput,
    /// Transaction pays an address.
    TxOutput,
    /// Identity controls an address.
    Ownership,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::TxInput => "tx-input",
            EdgeKind::TxOutput => "tx-output",
            EdgeKind::Ownership => "ownership",
        };
        f.write_str(name)
    }
}
