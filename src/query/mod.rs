use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::error::{PrivacyError, PrivacyResult};
use crate::model::edge::{Edge, EdgeKind};
use crate::model::node::{AddressNode, IdentityNode, Metadata, NodeId, TransactionNode};
use crate::store::graph::Graph;

// ---------------------------------------------------------------------------
// Report engine: read-only views over the graph for display
// ---------------------------------------------------------------------------

/// One counterpart movement seen from the reported address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementRow {
    /// Amount on the counterpart's edge.
    pub satoshis: Option<u64>,
    /// The address being reported on.
    pub linked: String,
    /// The counterpart address.
    pub address: String,
    /// Identity the report was requested for, if any.
    pub current: Option<String>,
    pub tx: String,
    /// Confirmation time of `tx`, when representable.
    pub date: Option<DateTime<Utc>>,
    pub tx_metadata: Metadata,
    /// Counterpart metadata, heuristic flags included.
    pub metadata: Metadata,
    pub expanded: bool,
    /// First identity owning the counterpart.
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressReport {
    pub hash: String,
    /// Notes from the ownership edge, when reported as part of an identity.
    pub annotations: Option<String>,
    pub expanded: bool,
    pub incoming: Vec<MovementRow>,
    pub outgoing: Vec<MovementRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityReport {
    pub name: String,
    /// Free-form description attached when the identity was added.
    pub extra: Option<String>,
    pub known_addresses: Vec<AddressReport>,
    pub incoming: Vec<MovementRow>,
    pub outgoing: Vec<MovementRow>,
}

/// Everything the explorer shows: identities first, then unowned addresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphReport {
    pub identities: Vec<IdentityReport>,
    pub unknown: Vec<AddressReport>,
}

/// The two-hop path behind a candidate row, handed to exclusion filters.
#[derive(Debug, Clone, Copy)]
pub struct Hop<'g> {
    pub address: &'g AddressNode,
    pub first: &'g Edge,
    pub transaction: &'g TransactionNode,
    pub second: &'g Edge,
    pub other: &'g AddressNode,
    pub other_identity: Option<&'g IdentityNode>,
}

/// Returns `true` to drop a row.
pub type ExcludeFilter<'a> = dyn Fn(&Hop<'_>) -> bool + 'a;

/// Optional context for [`address_report`].
#[derive(Default)]
pub struct AddressQuery<'a> {
    pub identity: Option<&'a IdentityNode>,
    pub annotations: Option<String>,
    pub exclude: Option<&'a ExcludeFilter<'a>>,
}

/// Report the movements around one address.
///
/// `incoming` walks `tx-output` to the paying transactions and then their
/// `tx-input` addresses; `outgoing` walks `tx-input` then `tx-output`.
pub fn address_report(graph: &Graph, address: &AddressNode, query: &AddressQuery<'_>) -> AddressReport {
    let mut incoming = Vec::new();
    let mut outgoing = Vec::new();
    collect_hops(graph, address, query, EdgeKind::TxOutput, EdgeKind::TxInput, &mut incoming);
    collect_hops(graph, address, query, EdgeKind::TxInput, EdgeKind::TxOutput, &mut outgoing);

    AddressReport {
        hash: address.hash.clone(),
        annotations: query.annotations.clone(),
        expanded: address.metadata.expanded,
        incoming,
        outgoing,
    }
}

/// [`address_report`] by hash, with no identity context.
pub fn address_report_by_hash(graph: &Graph, hash: &str) -> PrivacyResult<AddressReport> {
    let address = graph
        .get_address_node(hash)
        .ok_or_else(|| PrivacyError::address_not_found(hash))?;
    Ok(address_report(graph, address, &AddressQuery::default()))
}

fn collect_hops(
    graph: &Graph,
    address: &AddressNode,
    query: &AddressQuery<'_>,
    first_kind: EdgeKind,
    second_kind: EdgeKind,
    bucket: &mut Vec<MovementRow>,
) {
    for (first, tx_node) in graph.neighbors_by_kind(&address.id, first_kind) {
        let Some(transaction) = tx_node.as_transaction() else {
            continue;
        };
        for (second, other_node) in graph.neighbors_by_kind(&transaction.id, second_kind) {
            let Some(other) = other_node.as_address() else {
                continue;
            };
            let hop = Hop {
                address,
                first,
                transaction,
                second,
                other,
                other_identity: graph.identity_by_address(&other.hash),
            };
            if query.exclude.is_some_and(|exclude| exclude(&hop)) {
                continue;
            }
            bucket.push(MovementRow {
                satoshis: second.satoshis,
                linked: address.hash.clone(),
                address: other.hash.clone(),
                current: query.identity.map(|i| i.name.clone()),
                tx: transaction.txid.clone(),
                date: transaction.timestamp(),
                tx_metadata: transaction.metadata.clone(),
                metadata: other.metadata.clone(),
                expanded: other.metadata.expanded,
                identity: hop.other_identity.map(|i| i.name.clone()),
            });
        }
    }
}

/// Report every address owned by `identity`, dropping transfers between
/// addresses the identity itself owns.
pub fn identity_report(graph: &Graph, identity: &IdentityNode) -> IdentityReport {
    let owned_by_identity: &ExcludeFilter<'_> = &|hop| {
        graph
            .identities_by_address(&hop.other.hash)
            .iter()
            .any(|owner| owner.id == identity.id)
    };

    let mut report = IdentityReport {
        name: identity.name.clone(),
        extra: identity.extra.clone(),
        known_addresses: Vec::new(),
        incoming: Vec::new(),
        outgoing: Vec::new(),
    };
    let mut seen: HashSet<&NodeId> = HashSet::new();

    for (edge, node) in graph.neighbors_by_kind(&identity.id, EdgeKind::Ownership) {
        let Some(address) = node.as_address() else {
            continue;
        };
        if !seen.insert(&address.id) {
            continue;
        }
        let query = AddressQuery {
            identity: Some(identity),
            annotations: edge.annotations.clone(),
            exclude: Some(owned_by_identity),
        };
        let known = address_report(graph, address, &query);
        report.incoming.extend(known.incoming.iter().cloned());
        report.outgoing.extend(known.outgoing.iter().cloned());
        report.known_addresses.push(known);
    }

    report
}

pub fn identity_report_by_name(graph: &Graph, name: &str) -> PrivacyResult<IdentityReport> {
    let identity = graph
        .get_identity_node(name)
        .ok_or_else(|| PrivacyError::identity_not_found(name))?;
    Ok(identity_report(graph, identity))
}

/// Plain reports for addresses with no known owner.
pub fn addresses_report(graph: &Graph, addresses: &[&AddressNode]) -> Vec<AddressReport> {
    addresses
        .iter()
        .map(|address| address_report(graph, address, &AddressQuery::default()))
        .collect()
}

/// Identity reports for every identity, then plain reports for every
/// address none of them owns.
pub fn graph_report(graph: &Graph) -> GraphReport {
    let identities: Vec<IdentityReport> = graph
        .identities()
        .map(|identity| identity_report(graph, identity))
        .collect();

    let owned: HashSet<&str> = identities
        .iter()
        .flat_map(|report| report.known_addresses.iter().map(|a| a.hash.as_str()))
        .collect();
    let unknown: Vec<&AddressNode> = graph
        .addresses()
        .filter(|address| !owned.contains(address.hash.as_str()))
        .collect();

    GraphReport {
        unknown: addresses_report(graph, &unknown),
        identities,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::process_transaction;
    use crate::model::raw::{RawInput, RawOutput, RawTransaction, ScriptPubKey};

    fn tx(txid: &str, inputs: &[(&str, u64)], outputs: &[(&str, f64)]) -> RawTransaction {
        RawTransaction {
            txid: txid.to_string(),
            vin: inputs
                .iter()
                .map(|(addr, value_sat)| RawInput {
                    addr: Some(addr.to_string()),
                    value_sat: *value_sat,
                })
                .collect(),
            vout: outputs
                .iter()
                .map(|(addr, value)| RawOutput {
                    value: *value,
                    script_pub_key: ScriptPubKey {
                        addresses: vec![addr.to_string()],
                    },
                })
                .collect(),
            blockhash: format!("block-{txid}"),
            time: 1_600_000_000_000,
        }
    }

    /// C pays A, A pays B, B pays D. Jack owns A and B.
    fn build_graph() -> Graph {
        let mut g = Graph::new();
        for raw in [
            tx("t1", &[("1C", 100_000_000)], &[("1A", 1.0)]),
            tx("t2", &[("1A", 100_000_000)], &[("1B", 1.0)]),
            tx("t3", &[("1B", 100_000_000)], &[("1D", 1.0)]),
        ] {
            process_transaction(&mut g, &raw).unwrap();
        }
        g.add_identity_node(IdentityNode::new("Jack").with_extra("exchange customer"));
        g.associate_address("1A", "Jack", Some("cold wallet".into()))
            .unwrap();
        g.associate_address("1B", "Jack", None).unwrap();
        g
    }

    fn counterparts(rows: &[MovementRow]) -> Vec<&str> {
        rows.iter().map(|r| r.address.as_str()).collect()
    }

    #[test]
    fn test_address_report_two_hop_walk() {
        let g = build_graph();
        let report = address_report_by_hash(&g, "1A").unwrap();

        assert_eq!(counterparts(&report.incoming), vec!["1C"]);
        assert_eq!(counterparts(&report.outgoing), vec!["1B"]);
        assert_eq!(report.outgoing[0].identity.as_deref(), Some("Jack"));
        assert_eq!(report.outgoing[0].tx, "t2");
        assert_eq!(report.outgoing[0].satoshis, Some(100_000_000));
        assert_eq!(report.outgoing[0].linked, "1A");
        let date = report.outgoing[0].date.unwrap();
        assert_eq!(date.timestamp(), 1_600_000_000);
        assert_eq!(report.incoming[0].identity, None);
        assert!(report.annotations.is_none());
    }

    #[test]
    fn test_identity_report_drops_internal_transfers() {
        let g = build_graph();
        let report = identity_report_by_name(&g, "Jack").unwrap();

        assert_eq!(report.extra.as_deref(), Some("exchange customer"));
        assert_eq!(report.known_addresses.len(), 2);
        assert_eq!(counterparts(&report.incoming), vec!["1C"]);
        assert_eq!(counterparts(&report.outgoing), vec!["1D"]);
        assert_eq!(
            report.known_addresses[0].annotations.as_deref(),
            Some("cold wallet")
        );
        assert!(report.incoming.iter().all(|r| r.current.as_deref() == Some("Jack")));

        // Each known address keeps its own filtered rows.
        let a = &report.known_addresses[0];
        assert_eq!(a.hash, "1A");
        assert!(a.outgoing.is_empty());
        let b = &report.known_addresses[1];
        assert!(b.incoming.is_empty());
        assert_eq!(counterparts(&b.outgoing), vec!["1D"]);
    }

    #[test]
    fn test_exclude_filter_sees_full_hop() {
        let g = build_graph();
        let address = g.get_address_node("1A").unwrap();
        let drop_t1: &ExcludeFilter<'_> = &|hop| hop.transaction.txid == "t1";
        let report = address_report(
            &g,
            address,
            &AddressQuery {
                exclude: Some(drop_t1),
                ..Default::default()
            },
        );
        assert!(report.incoming.is_empty());
        assert_eq!(report.outgoing.len(), 1);
    }

    #[test]
    fn test_graph_report_splits_owned_and_unknown() {
        let g = build_graph();
        let report = graph_report(&g);
        assert_eq!(report.identities.len(), 1);
        let unknown: Vec<&str> = report.unknown.iter().map(|a| a.hash.as_str()).collect();
        assert_eq!(unknown, vec!["1C", "1D"]);
    }

    #[test]
    fn test_unknown_lookups_fail() {
        let g = build_graph();
        assert!(matches!(
            address_report_by_hash(&g, "1Zzz"),
            Err(PrivacyError::NotFound { .. })
        ));
        assert!(identity_report_by_name(&g, "Nobody").is_err());
    }
}
