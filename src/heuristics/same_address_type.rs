use crate::model::edge::EdgeKind;
use crate::model::node::{AddressNode, NodeId, TransactionNode};
use crate::model::strategy::SameAddressType;
use crate::store::graph::Graph;

/// Find likely change addresses by address format.
///
/// When one side of a transaction holds a single address, the addresses on
/// the other side whose leading character matches it are flagged, provided
/// the other side also holds at least one address that does not match.
/// Inputs -> outputs is scanned for every transaction first, then outputs ->
/// inputs; a later finding for the same address replaces an earlier one.
pub fn detect(graph: &Graph) -> Vec<(NodeId, SameAddressType)> {
    let mut findings = Vec::new();
    for (source, target) in [
        (EdgeKind::TxInput, EdgeKind::TxOutput),
        (EdgeKind::TxOutput, EdgeKind::TxInput),
    ] {
        for tx in graph.transactions() {
            detect_direction(graph, tx, source, target, &mut findings);
        }
    }
    findings
}

fn detect_direction(
    graph: &Graph,
    tx: &TransactionNode,
    source: EdgeKind,
    target: EdgeKind,
    findings: &mut Vec<(NodeId, SameAddressType)>,
) {
    let sources = distinct_addresses(graph, tx, source);
    let [original] = sources.as_slice() else {
        return;
    };
    let lead = leading_char(&original.hash);

    let targets = distinct_addresses(graph, tx, target);
    let (same, different): (Vec<&AddressNode>, Vec<&AddressNode>) = targets
        .into_iter()
        .partition(|address| leading_char(&address.hash) == lead);
    if same.is_empty() || different.is_empty() {
        return;
    }

    let identity = graph
        .identity_by_address(&original.hash)
        .map(|identity| identity.name.clone());
    for address in same {
        findings.push((
            address.id.clone(),
            SameAddressType {
                transaction: tx.txid.clone(),
                address: original.hash.clone(),
                identity: identity.clone(),
            },
        ));
    }
}

fn distinct_addresses<'g>(graph: &'g Graph, tx: &TransactionNode, kind: EdgeKind) -> Vec<&'g AddressNode> {
    let mut addresses: Vec<&AddressNode> = Vec::new();
    for (_, node) in graph.neighbors_by_kind(&tx.id, kind) {
        if let Some(address) = node.as_address() {
            if !addresses.iter().any(|seen| seen.id == address.id) {
                addresses.push(address);
            }
        }
    }
    addresses
}

fn leading_char(hash: &str) -> Option<char> {
    hash.chars().next()
}

/// Recompute the `sameAddressType` slot on every address.
pub fn apply(graph: &mut Graph) -> usize {
    let findings = detect(graph);
    for metadata in graph.metadata_iter_mut() {
        metadata.strategy.same_address_type = None;
    }
    let count = findings.len();
    for (id, record) in findings {
        if let Some(metadata) = graph.metadata_mut(&id) {
            metadata.strategy.same_address_type = Some(record);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::test_support::{build, tx};

    fn flag<'g>(g: &'g Graph, hash: &str) -> Option<&'g SameAddressType> {
        g.get_address_node(hash)
            .unwrap()
            .metadata
            .strategy
            .same_address_type
            .as_ref()
    }

    #[test]
    fn test_matching_output_is_tagged() {
        let mut g = build(&[tx("t1", &["1Axxx"], &[("1Byyy", 0.3), ("3Czzz", 0.7)])]);
        g.add_identity("Jack");
        g.associate_address("1Axxx", "Jack", None).unwrap();

        assert_eq!(apply(&mut g), 1);
        let record = flag(&g, "1Byyy").unwrap();
        assert_eq!(record.transaction, "t1");
        assert_eq!(record.address, "1Axxx");
        assert_eq!(record.identity.as_deref(), Some("Jack"));
        assert!(flag(&g, "3Czzz").is_none());
        assert!(flag(&g, "1Axxx").is_none());
    }

    #[test]
    fn test_uniform_outputs_trigger_nothing() {
        let mut g = build(&[
            tx("t1", &["1Axxx"], &[("1Byyy", 0.3), ("1Czzz", 0.7)]),
            tx("t2", &["1Dxxx"], &[("3Byyy", 0.3), ("3Czzz", 0.7)]),
        ]);
        assert_eq!(apply(&mut g), 0);
    }

    #[test]
    fn test_multiple_sources_trigger_nothing() {
        let mut g = build(&[tx(
            "t1",
            &["1Axxx", "1Exxx"],
            &[("1Byyy", 0.3), ("3Czzz", 0.7)],
        )]);
        assert_eq!(apply(&mut g), 0);
    }

    #[test]
    fn test_reverse_direction_tags_inputs() {
        // Single output funded by mixed-format inputs.
        let mut g = build(&[tx("t1", &["3Pxxx", "1Qxxx"], &[("3Out", 1.0)])]);
        assert_eq!(apply(&mut g), 1);
        let record = flag(&g, "3Pxxx").unwrap();
        assert_eq!(record.address, "3Out");
        assert_eq!(record.identity, None);
        assert!(flag(&g, "1Qxxx").is_none());
    }
}
