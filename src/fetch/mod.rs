use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PrivacyError, PrivacyResult};
use crate::ingest::{ingest_transactions, IngestStats};
use crate::model::node::NodeId;
use crate::model::raw::{RawTransaction, RawTransactionPage};
use crate::store::graph::Graph;

// ---------------------------------------------------------------------------
// TransactionSource: the fetch collaborator seam
// ---------------------------------------------------------------------------

/// Anything that can list the transactions touching an address.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch(&self, address: &str) -> PrivacyResult<Vec<RawTransaction>>;
}

/// In-process source indexed by every address a record mentions.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    by_address: HashMap<String, Vec<RawTransaction>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(records: impl IntoIterator<Item = RawTransaction>) -> Self {
        let mut source = Self::new();
        for raw in records {
            source.insert(raw);
        }
        source
    }

    pub fn insert(&mut self, raw: RawTransaction) {
        let mut addresses: Vec<&str> = raw.vin.iter().filter_map(|vin| vin.addr.as_deref()).collect();
        addresses.extend(
            raw.vout
                .iter()
                .flat_map(|vout| vout.script_pub_key.addresses.iter().map(String::as_str)),
        );
        addresses.sort_unstable();
        addresses.dedup();

        for address in addresses {
            self.by_address
                .entry(address.to_string())
                .or_default()
                .push(raw.clone());
        }
    }
}

#[async_trait]
impl TransactionSource for MemorySource {
    async fn fetch(&self, address: &str) -> PrivacyResult<Vec<RawTransaction>> {
        Ok(self.by_address.get(address).cloned().unwrap_or_default())
    }
}

/// Reads `<dir>/<address>.json`, an Insight-style `{ "txs": [...] }` page.
/// A missing file means the address has no known transactions.
#[derive(Debug, Clone)]
pub struct FixtureDirSource {
    dir: PathBuf,
}

impl FixtureDirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TransactionSource for FixtureDirSource {
    async fn fetch(&self, address: &str) -> PrivacyResult<Vec<RawTransaction>> {
        if address.is_empty() || !address.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PrivacyError::Fetch(format!(
                "refusing to read fixture for malformed address '{}'",
                address
            )));
        }

        let path = self.dir.join(format!("{address}.json"));
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no fixture for address");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let page: RawTransactionPage = serde_json::from_str(&body)?;
        Ok(page.txs)
    }
}

// ---------------------------------------------------------------------------
// Expansion: fetch, ingest, and mark an address as explored
// ---------------------------------------------------------------------------

/// Fetch every transaction touching `address`, ingest each, then set the
/// address's `expanded` flag.
///
/// Fails with `NotFound` when the address is neither in the graph already
/// nor mentioned by any fetched record.
pub async fn expand(
    graph: &mut Graph,
    source: &dyn TransactionSource,
    address: &str,
) -> PrivacyResult<IngestStats> {
    let records = source.fetch(address).await?;
    finish_expansion(graph, address, &records)
}

/// Expand several addresses, fetching concurrently and ingesting each
/// response as it completes.
pub async fn expand_many(
    graph: &mut Graph,
    source: &dyn TransactionSource,
    addresses: &[String],
) -> PrivacyResult<IngestStats> {
    let mut pending: FuturesUnordered<_> = addresses
        .iter()
        .map(|address| async move { (address, source.fetch(address).await) })
        .collect();

    let mut total = IngestStats::default();
    while let Some((address, fetched)) = pending.next().await {
        let stats = finish_expansion(graph, address, &fetched?)?;
        total.ingested += stats.ingested;
        total.skipped += stats.skipped;
        total.addresses_created += stats.addresses_created;
        total.edges_created += stats.edges_created;
    }
    Ok(total)
}

fn finish_expansion(
    graph: &mut Graph,
    address: &str,
    records: &[RawTransaction],
) -> PrivacyResult<IngestStats> {
    let stats = ingest_transactions(graph, records)?;
    let metadata = graph
        .metadata_mut(&NodeId::address(address))
        .ok_or_else(|| PrivacyError::address_not_found(address))?;
    metadata.expanded = true;

    info!(
        address,
        fetched = records.len(),
        ingested = stats.ingested,
        skipped = stats.skipped,
        "expanded address"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::raw::{RawInput, RawOutput, ScriptPubKey};

    fn record(txid: &str, from: &str, to: &str) -> RawTransaction {
        RawTransaction {
            txid: txid.to_string(),
            vin: vec![RawInput {
                addr: Some(from.to_string()),
                value_sat: 50_000,
            }],
            vout: vec![RawOutput {
                value: 0.0005,
                script_pub_key: ScriptPubKey {
                    addresses: vec![to.to_string()],
                },
            }],
            blockhash: "b".to_string(),
            time: 0,
        }
    }

    #[tokio::test]
    async fn test_expand_marks_address() {
        let source = MemorySource::from_transactions([
            record("t1", "1A", "1B"),
            record("t2", "1B", "1C"),
        ]);
        let mut g = Graph::new();
        g.add_address("1B");

        let stats = expand(&mut g, &source, "1B").await.unwrap();
        assert_eq!(stats.ingested, 2);
        assert!(g.get_address_node("1B").unwrap().metadata.expanded);
        assert!(!g.get_address_node("1A").unwrap().metadata.expanded);
        assert_eq!(g.transactions().count(), 2);
    }

    #[tokio::test]
    async fn test_expand_twice_is_idempotent() {
        let source = MemorySource::from_transactions([record("t1", "1A", "1B")]);
        let mut g = Graph::new();
        expand(&mut g, &source, "1A").await.unwrap();
        let edges = g.edge_count();
        let stats = expand(&mut g, &source, "1A").await.unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(g.edge_count(), edges);
    }

    #[tokio::test]
    async fn test_expand_unknown_address_without_records() {
        let mut g = Graph::new();
        let err = expand(&mut g, &MemorySource::new(), "1Nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, PrivacyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_expand_many_matches_sequential_result() {
        let source = MemorySource::from_transactions([
            record("t1", "1A", "1B"),
            record("t2", "1B", "1C"),
            record("t3", "1C", "1A"),
        ]);
        let mut g = Graph::new();
        let addresses = vec!["1A".to_string(), "1C".to_string()];
        let stats = expand_many(&mut g, &source, &addresses).await.unwrap();

        assert_eq!(stats.ingested, 3);
        assert_eq!(g.transactions().count(), 3);
        assert_eq!(g.edge_count(), 6);
        assert!(g.get_address_node("1A").unwrap().metadata.expanded);
        assert!(g.get_address_node("1C").unwrap().metadata.expanded);
        assert!(!g.get_address_node("1B").unwrap().metadata.expanded);
    }

    #[tokio::test]
    async fn test_fixture_page_with_coinbase_expands() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"txs": [
            {"txid": "cb", "vin": [{"coinbase": "03a0bb0d", "sequence": 4294967295}],
             "vout": [{"value": 6.25, "scriptPubKey": {"addresses": ["1Miner"]}}],
             "blockhash": "000a", "time": 1600000000000},
            {"txid": "spend", "vin": [{"addr": "1Miner", "valueSat": 625000000}],
             "vout": [{"value": 6.2499, "scriptPubKey": {"addresses": ["1Shop"]}}],
             "blockhash": "000b", "time": 1600000600000}
        ]}"#;
        std::fs::write(dir.path().join("1Miner.json"), body).unwrap();

        let source = FixtureDirSource::new(dir.path());
        let mut g = Graph::new();
        let stats = expand(&mut g, &source, "1Miner").await.unwrap();

        assert_eq!(stats.ingested, 2);
        assert!(g.get_transaction_by_id("cb").is_some());
        assert!(g.get_transaction_by_id("spend").is_some());
        assert_eq!(g.edge_count(), 3);
        assert!(g.get_address_node("1Miner").unwrap().metadata.expanded);
    }

    #[tokio::test]
    async fn test_fixture_dir_source() {
        let dir = tempfile::tempdir().unwrap();
        let page = RawTransactionPage {
            txs: vec![record("t1", "1A", "1B")],
        };
        std::fs::write(
            dir.path().join("1A.json"),
            serde_json::to_string(&page).unwrap(),
        )
        .unwrap();

        let source = FixtureDirSource::new(dir.path());
        assert_eq!(source.fetch("1A").await.unwrap().len(), 1);
        assert!(source.fetch("1Missing").await.unwrap().is_empty());
        assert!(matches!(
            source.fetch("../etc").await,
            Err(PrivacyError::Fetch(_))
        ));
    }
}
