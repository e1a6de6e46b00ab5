//! Error types for the provisioner

use crate::types::{ResourceId, ResourceKind, Stage};
use thiserror::Error;

/// Result type alias using the provisioner Error
pub type Result<T> = std::result::Result<T, Error>;

/// Provisioner error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("{stage} for {resource} did not complete within {waited_ms}ms")]
    StageTimeout {
        stage: Stage,
        resource: String,
        waited_ms: u64,
    },

    #[error("No billing item for resource {id}, so the order cannot be cancelled")]
    NotBillable { id: ResourceId },

    #[error("Catalog package '{package}' unavailable: {reason}")]
    CatalogUnavailable { package: String, reason: String },

    #[error("Catalog authorization failed: {0}")]
    CatalogAuthorization(String),

    #[error("{operation} is not supported for {kind} resources")]
    UnsupportedOperation {
        operation: &'static str,
        kind: ResourceKind,
    },

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid resource id '{0}': expected a number")]
    InvalidId(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Vendor call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Vendor error: {0}")]
    Vendor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid hardware profile: {0}")]
    InvalidProfile(String),
}

impl Error {
    /// Failures worth another attempt after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Vendor(_))
    }

    /// Failures that must never be retried
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::Unauthorized(_) | Error::CatalogAuthorization(_))
    }

    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::Timeout { seconds: 30 }.is_transient());
        assert!(Error::Vendor("502".into()).is_transient());
        assert!(!Error::Unauthorized("bad key".into()).is_transient());
        assert!(Error::Unauthorized("bad key".into()).is_authorization());
        assert!(!Error::not_found("resource", 1).is_transient());
    }

    #[test]
    fn test_stage_timeout_message() {
        let err = Error::StageTimeout {
            stage: Stage::TransactionsEnded,
            resource: "node42 (555)".into(),
            waited_ms: 1000,
        };
        assert_eq!(
            err.to_string(),
            "transactions to end for node42 (555) did not complete within 1000ms"
        );
    }
}
