//! Deanonymization heuristics.
//!
//! Each detector reads the whole graph, then rewrites only its own slot in
//! `metadata.strategy` from scratch, so running them again after more
//! ingestion is always safe and the order between them does not matter.

pub mod coinjoin;
pub mod large_spend;
pub mod same_address_type;

use serde::Serialize;
use tracing::info;

use crate::config::HeuristicsConfig;
use crate::store::graph::Graph;

/// Findings written by one [`apply_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeuristicSummary {
    pub large_spend: usize,
    pub same_address_type: usize,
    pub coinjoin: usize,
}

/// Run every detector with the configured thresholds.
pub fn apply_all(graph: &mut Graph, config: &HeuristicsConfig) -> HeuristicSummary {
    let summary = HeuristicSummary {
        large_spend: large_spend::apply(graph, config.large_spend_threshold),
        same_address_type: same_address_type::apply(graph),
        coinjoin: coinjoin::apply(graph, config.coinjoin_minimum_fanout),
    };
    info!(
        large_spend = summary.large_spend,
        same_address_type = summary.same_address_type,
        coinjoin = summary.coinjoin,
        "heuristics applied"
    );
    summary
}
