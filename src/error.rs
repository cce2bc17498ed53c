use thiserror::Error;

use crate::model::node::{NodeId, NodeKind};

/// Central error type for privgraph operations.
#[derive(Error, Debug)]
pub enum PrivacyError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: NodeKind, key: String },

    #[error("Dangling edge {from} -> {to}: node {missing} does not exist")]
    DanglingReference {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrivacyError {
    pub fn address_not_found(hash: impl Into<String>) -> Self {
        PrivacyError::NotFound {
            kind: NodeKind::Address,
            key: hash.into(),
        }
    }

    pub fn identity_not_found(name: impl Into<String>) -> Self {
        PrivacyError::NotFound {
            kind: NodeKind::Identity,
            key: name.into(),
        }
    }
}

/// Convenience type alias for privgraph results.
pub type PrivacyResult<T> = Result<T, PrivacyError>;
