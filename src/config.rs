use crate::error::{PrivacyError, PrivacyResult};
use crate::heuristics::{coinjoin, large_spend};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub heuristics: HeuristicsConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HeuristicsConfig {
    #[serde(default = "default_large_spend_threshold")]
    pub large_spend_threshold: f64,
    #[serde(default = "default_coinjoin_minimum_fanout")]
    pub coinjoin_minimum_fanout: usize,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            large_spend_threshold: default_large_spend_threshold(),
            coinjoin_minimum_fanout: default_coinjoin_minimum_fanout(),
        }
    }
}

fn default_large_spend_threshold() -> f64 {
    large_spend::DEFAULT_THRESHOLD
}

fn default_coinjoin_minimum_fanout() -> usize {
    coinjoin::DEFAULT_MINIMUM_FANOUT
}

/// How an association with a missing endpoint is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationMode {
    /// Report the missing endpoint as an error.
    #[default]
    Strict,
    /// Log a warning and carry on without creating an edge.
    Lenient,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub association: AssociationMode,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Directory of `<address>.json` transaction pages.
    pub fixtures_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

pub fn load_config(path: Option<&Path>) -> PrivacyResult<AppConfig> {
    let mut builder = Config::builder()
        .add_source(File::with_name("privgraph").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PRIVGRAPH").separator("__"));

    let config = builder
        .build()
        .map_err(|err| PrivacyError::Config(err.to_string()))?;

    let parsed: AppConfig = config
        .try_deserialize()
        .map_err(|err| PrivacyError::Config(err.to_string()))?;

    parsed.validate()?;
    Ok(parsed)
}

impl AppConfig {
    pub fn validate(&self) -> PrivacyResult<()> {
        let threshold = self.heuristics.large_spend_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(PrivacyError::Config(format!(
                "heuristics.large_spend_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        Ok(())
    }
}
