use crate::model::edge::EdgeKind;
use crate::model::node::NodeId;
use crate::model::strategy::LargeSpend;
use crate::store::graph::Graph;

/// Share of a transaction's output total above which an output counts as
/// the real payment rather than change.
pub const DEFAULT_THRESHOLD: f64 = 0.90;

/// Find outputs receiving at least `threshold` of their transaction's total
/// output value. Transactions paying out nothing are skipped.
pub fn detect(graph: &Graph, threshold: f64) -> Vec<(NodeId, LargeSpend)> {
    let mut findings = Vec::new();

    for tx in graph.transactions() {
        let mut addresses: Vec<String> = Vec::new();
        let mut identities: Vec<String> = Vec::new();
        for (_, node) in graph.neighbors_by_kind(&tx.id, EdgeKind::TxInput) {
            let Some(address) = node.as_address() else {
                continue;
            };
            push_unique(&mut addresses, &address.hash);
            for identity in graph.identities_by_address(&address.hash) {
                push_unique(&mut identities, &identity.name);
            }
        }

        let outputs = graph.neighbors_by_kind(&tx.id, EdgeKind::TxOutput);
        let total = outputs
            .clone()
            .map(|(edge, _)| edge.satoshis.unwrap_or(0))
            .fold(0u64, u64::saturating_add);
        if total == 0 {
            continue;
        }

        for (edge, node) in outputs {
            let spent = edge.satoshis.unwrap_or(0);
            let fraction = spent as f64 / total as f64;
            if fraction >= threshold {
                findings.push((
                    node.id().clone(),
                    LargeSpend {
                        fraction,
                        percentage: fraction * 100.0,
                        spent,
                        total,
                        transaction: tx.txid.clone(),
                        addresses: addresses.clone(),
                        identities: identities.clone(),
                    },
                ));
            }
        }
    }

    findings
}

/// Recompute the `largeSpend` slot on every address. Returns the number of
/// findings written.
pub fn apply(graph: &mut Graph, threshold: f64) -> usize {
    let findings = detect(graph, threshold);
    for metadata in graph.metadata_iter_mut() {
        metadata.strategy.large_spend = None;
    }
    let count = findings.len();
    for (id, record) in findings {
        if let Some(metadata) = graph.metadata_mut(&id) {
            metadata.strategy.large_spend = Some(record);
        }
    }
    count
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::test_support::{build, tx};

    #[test]
    fn test_ninety_percent_output_is_tagged() {
        let mut g = build(&[tx("t1", &["1In"], &[("1Small", 0.10), ("1Big", 0.90)])]);
        g.add_identity("Jack");
        g.associate_address("1In", "Jack", None).unwrap();

        assert_eq!(apply(&mut g, DEFAULT_THRESHOLD), 1);

        let big = g.get_address_node("1Big").unwrap();
        let record = big.metadata.strategy.large_spend.as_ref().unwrap();
        assert_eq!(record.spent, 90_000_000);
        assert_eq!(record.total, 100_000_000);
        assert!((record.fraction - 0.9).abs() < 1e-12);
        assert!((record.percentage - 90.0).abs() < 1e-9);
        assert_eq!(record.transaction, "t1");
        assert_eq!(record.addresses, vec!["1In".to_string()]);
        assert_eq!(record.identities, vec!["Jack".to_string()]);

        let small = g.get_address_node("1Small").unwrap();
        assert!(small.metadata.strategy.large_spend.is_none());
    }

    #[test]
    fn test_even_split_is_not_tagged() {
        let mut g = build(&[tx("t1", &["1In"], &[("1A", 0.5), ("1B", 0.5)])]);
        assert_eq!(apply(&mut g, DEFAULT_THRESHOLD), 0);
    }

    #[test]
    fn test_zero_total_is_skipped() {
        let mut g = build(&[tx("t1", &["1In"], &[("1A", 0.0)]), tx("t2", &["1In"], &[])]);
        assert_eq!(apply(&mut g, DEFAULT_THRESHOLD), 0);
    }

    #[test]
    fn test_oversized_outputs_saturate_total() {
        let mut g = build(&[tx("t1", &["1In"], &[("1A", 1e12), ("1B", 1e12)])]);
        assert_eq!(apply(&mut g, DEFAULT_THRESHOLD), 2);
        let record = g
            .get_address_node("1A")
            .unwrap()
            .metadata
            .strategy
            .large_spend
            .clone()
            .unwrap();
        assert_eq!(record.total, u64::MAX);
    }

    #[test]
    fn test_rerun_clears_stale_flags() {
        let mut g = build(&[tx("t1", &["1In"], &[("1Small", 0.05), ("1Big", 0.95)])]);
        apply(&mut g, DEFAULT_THRESHOLD);
        assert!(g
            .get_address_node("1Big")
            .unwrap()
            .metadata
            .strategy
            .large_spend
            .is_some());

        apply(&mut g, 0.99);
        assert!(g
            .get_address_node("1Big")
            .unwrap()
            .metadata
            .strategy
            .large_spend
            .is_none());
    }
}
