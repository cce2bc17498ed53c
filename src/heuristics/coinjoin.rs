use std::collections::HashSet;

use crate::model::edge::EdgeKind;
use crate::model::node::NodeId;
use crate::model::strategy::CoinjoinDetection;
use crate::store::graph::Graph;

/// Distinct addresses on one side above which a transaction looks like a coinjoin.
pub const DEFAULT_MINIMUM_FANOUT: usize = 12;

/// Flag transactions whose distinct input or output address count exceeds
/// `minimum_fanout`.
pub fn detect(graph: &Graph, minimum_fanout: usize) -> Vec<(NodeId, CoinjoinDetection)> {
    graph
        .transactions()
        .filter_map(|tx| {
            let inputs = distinct_count(graph, &tx.id, EdgeKind::TxInput);
            let outputs = distinct_count(graph, &tx.id, EdgeKind::TxOutput);
            (inputs > minimum_fanout || outputs > minimum_fanout).then(|| {
                (
                    tx.id.clone(),
                    CoinjoinDetection {
                        inputs,
                        outputs,
                        coinjoin_probable: true,
                    },
                )
            })
        })
        .collect()
}

fn distinct_count(graph: &Graph, tx: &NodeId, kind: EdgeKind) -> usize {
    graph
        .neighbors_by_kind(tx, kind)
        .map(|(_, node)| node.id())
        .collect::<HashSet<_>>()
        .len()
}

/// Recompute the `coinjoinDetection` slot on every transaction.
pub fn apply(graph: &mut Graph, minimum_fanout: usize) -> usize {
    let findings = detect(graph, minimum_fanout);
    for metadata in graph.metadata_iter_mut() {
        metadata.strategy.coinjoin_detection = None;
    }
    let count = findings.len();
    for (id, record) in findings {
        if let Some(metadata) = graph.metadata_mut(&id) {
            metadata.strategy.coinjoin_detection = Some(record);
        }
    }
    count
}
