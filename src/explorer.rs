use tracing::{info, warn};

use crate::config::{AppConfig, AssociationMode};
use crate::error::{PrivacyError, PrivacyResult};
use crate::fetch::{self, TransactionSource};
use crate::heuristics::{self, HeuristicSummary};
use crate::ingest::IngestStats;
use crate::model::edge::EdgeId;
use crate::model::node::IdentityNode;
use crate::query::{graph_report, GraphReport};
use crate::store::graph::Graph;
use crate::store::observer::GraphObserver;

/// Owns the graph together with the source used to expand it, and applies
/// the configured association policy and heuristic thresholds.
pub struct Explorer {
    graph: Graph,
    config: AppConfig,
    source: Box<dyn TransactionSource>,
}

impl Explorer {
    pub fn new(config: AppConfig, source: Box<dyn TransactionSource>) -> Self {
        Self {
            graph: Graph::new(),
            config,
            source,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn GraphObserver>) -> Self {
        self.graph.subscribe(observer);
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Track an address and pull in its history.
    pub async fn add_address(&mut self, hash: &str) -> PrivacyResult<IngestStats> {
        if self.graph.add_address(hash) {
            self.graph.finished_adding();
        }
        self.expand(hash).await
    }

    pub fn add_identity(&mut self, name: &str) -> bool {
        self.add_identity_node(IdentityNode::new(name))
    }

    /// Add an identity carrying a description, e.g. `IdentityNode::with_extra`.
    pub fn add_identity_node(&mut self, node: IdentityNode) -> bool {
        let added = self.graph.add_identity_node(node);
        if added {
            self.graph.finished_adding();
        }
        added
    }

    /// Link an address to an identity, then expand the address.
    ///
    /// In lenient mode a missing endpoint is logged and `Ok(None)` returned.
    /// The ownership edge is kept even if the follow-up expansion fails; that
    /// failure is logged and the edge still returned.
    pub async fn associate(
        &mut self,
        address: &str,
        identity: &str,
        annotations: Option<String>,
    ) -> PrivacyResult<Option<EdgeId>> {
        let edge = match self.graph.associate_address(address, identity, annotations) {
            Ok(edge) => edge,
            Err(err @ PrivacyError::NotFound { .. })
                if self.config.graph.association == AssociationMode::Lenient =>
            {
                warn!(address, identity, error = %err, "association skipped");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.graph.finished_adding();
        info!(address, identity, "address associated");

        if let Err(err) = self.expand(address).await {
            warn!(address, error = %err, "expansion after association failed");
        }
        Ok(Some(edge))
    }

    pub async fn expand(&mut self, hash: &str) -> PrivacyResult<IngestStats> {
        fetch::expand(&mut self.graph, self.source.as_ref(), hash).await
    }

    /// Expand every address not yet expanded.
    pub async fn expand_pending(&mut self) -> PrivacyResult<IngestStats> {
        let pending: Vec<String> = self
            .graph
            .addresses()
            .filter(|address| !address.metadata.expanded)
            .map(|address| address.hash.clone())
            .collect();
        fetch::expand_many(&mut self.graph, self.source.as_ref(), &pending).await
    }

    pub fn refresh(&mut self) -> HeuristicSummary {
        heuristics::apply_all(&mut self.graph, &self.config.heuristics)
    }

    pub fn report(&self) -> GraphReport {
        graph_report(&self.graph)
    }
}
