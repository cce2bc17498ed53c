pub mod config;
pub mod error;
pub mod explorer;
pub mod fetch;
pub mod heuristics;
pub mod ingest;
pub mod model;
pub mod query;
pub mod store;

pub use config::{load_config, AppConfig, AssociationMode, HeuristicsConfig};
pub use error::{PrivacyError, PrivacyResult};
pub use explorer::Explorer;
pub use fetch::{FixtureDirSource, MemorySource, TransactionSource};
pub use model::*;
pub use store::{Graph, GraphObserver};
