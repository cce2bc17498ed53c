use tracing::{debug, warn};

use crate::error::PrivacyResult;
use crate::model::edge::{Edge, EdgeKind};
use crate::model::node::{NodeId, TransactionNode};
use crate::model::raw::RawTransaction;
use crate::store::graph::Graph;

// ---------------------------------------------------------------------------
// Ingestion: turn raw transaction records into graph nodes and edges
// ---------------------------------------------------------------------------

/// What happened when a record was offered to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The transaction was new and has been fully added.
    Ingested(IngestResult),
    /// A transaction with this txid already exists; nothing changed.
    AlreadyPresent,
}

/// Counts for a freshly ingested transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestResult {
    pub txid: String,
    /// Address nodes that did not exist before this transaction.
    pub addresses_created: usize,
    pub edges_created: usize,
}

/// Running totals over a batch of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub ingested: usize,
    pub skipped: usize,
    pub addresses_created: usize,
    pub edges_created: usize,
}

impl IngestStats {
    pub fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Ingested(result) => {
                self.ingested += 1;
                self.addresses_created += result.addresses_created;
                self.edges_created += result.edges_created;
            }
            IngestOutcome::AlreadyPresent => self.skipped += 1,
        }
    }
}

/// Ingest one raw transaction.
///
/// This function:
/// 1. Returns early if the txid is already in the graph
/// 2. Adds every input address and every listed output address
/// 3. Creates the transaction node
/// 4. Links inputs (address -> tx) then outputs (tx -> address), in array order
/// 5. Signals `on_finished_adding` once
///
/// Outputs only link their first listed address. Inputs without an address
/// (coinbase) and outputs listing no address get no edge.
pub fn process_transaction(graph: &mut Graph, raw: &RawTransaction) -> PrivacyResult<IngestOutcome> {
    if graph.get_transaction_by_id(&raw.txid).is_some() {
        debug!(txid = %raw.txid, "transaction already ingested");
        return Ok(IngestOutcome::AlreadyPresent);
    }

    let mut addresses_created = 0;
    let input_addresses = raw.vin.iter().filter_map(|vin| vin.addr.as_deref());
    let output_addresses = raw
        .vout
        .iter()
        .flat_map(|vout| vout.script_pub_key.addresses.iter().map(String::as_str));
    for hash in input_addresses.chain(output_addresses) {
        if graph.add_address(hash) {
            addresses_created += 1;
        }
    }

    let tx_id = NodeId::transaction(raw.txid.as_str());
    graph.add_transaction(TransactionNode::new(
        raw.txid.as_str(),
        raw.time,
        raw.blockhash.as_str(),
    ));

    let mut edges_created = 0;
    for (index, vin) in raw.vin.iter().enumerate() {
        let Some(hash) = vin.addr.as_deref() else {
            warn!(txid = %raw.txid, input = index, "input has no address (coinbase?), skipping");
            continue;
        };
        let edge = Edge::new(EdgeKind::TxInput, NodeId::address(hash), tx_id.clone())
            .with_satoshis(vin.value_sat);
        graph.add_edge(edge)?;
        edges_created += 1;
    }
    for (index, vout) in raw.vout.iter().enumerate() {
        let Some(hash) = vout.primary_address() else {
            warn!(txid = %raw.txid, output = index, "output lists no address, skipping");
            continue;
        };
        if vout.script_pub_key.addresses.len() > 1 {
            debug!(txid = %raw.txid, output = index, "multi-address output, linking first address only");
        }
        let edge = Edge::new(EdgeKind::TxOutput, tx_id.clone(), NodeId::address(hash))
            .with_satoshis(vout.satoshis());
        graph.add_edge(edge)?;
        edges_created += 1;
    }

    graph.finished_adding();

    debug!(
        txid = %raw.txid,
        addresses_created,
        edges_created,
        "ingested transaction"
    );

    Ok(IngestOutcome::Ingested(IngestResult {
        txid: raw.txid.clone(),
        addresses_created,
        edges_created,
    }))
}

/// Ingest a batch of records in order.
pub fn ingest_transactions(graph: &mut Graph, records: &[RawTransaction]) -> PrivacyResult<IngestStats> {
    let mut stats = IngestStats::default();
    for raw in records {
        let outcome = process_transaction(graph, raw)?;
        stats.record(&outcome);
    }
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
