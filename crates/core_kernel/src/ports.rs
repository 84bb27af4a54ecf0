//! Ports and Adapters Infrastructure
//!
//! The ledger engine talks to storage only through port traits defined in the
//! domain crate. This module holds what every port and adapter shares: the
//! error type adapters must return and the marker trait ports extend.
//!
//! ```text
//! ┌───────────────────────────────┐
//! │   LedgerService (use cases)   │
//! └───────────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────────┐
//! │  LedgerPort / LedgerTransaction │
//! └───────────────────────────────┘
//!          ▲                ▲
//!   ┌──────┴──────┐  ┌──────┴──────┐
//!   │  PostgreSQL │  │  In-memory  │
//!   │  (infra_db) │  │   (mock)    │
//!   └─────────────┘  └─────────────┘
//! ```

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error type for port operations
///
/// Adapters translate their native failures (SQL states, lock poisoning, ...)
/// into these variants so the domain never sees storage-specific errors.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// The store rejected the data as malformed
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The operation conflicts with existing data (unique constraint)
    ///
    /// `key` names what collided: a constraint, an index or an entity id.
    #[error("Conflict on {key}: {message}")]
    Conflict {
        key: String,
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Conflict error on `key`
    pub fn conflict(key: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::Conflict {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if retrying later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. })
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns true if this error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker trait for all domain ports
///
/// All port traits extend this marker so they are thread-safe and usable
/// behind `Arc<dyn …>` in async contexts.
pub trait DomainPort: Send + Sync + 'static {
    /// Which kind of adapter backs this port
    fn adapter_type(&self) -> AdapterType;
}

/// Type of adapter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Internal database adapter (PostgreSQL)
    Internal,
    /// In-process adapter for tests and local runs
    Mock,
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterType::Internal => write!(f, "internal"),
            AdapterType::Mock => write!(f, "mock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Payment", "123");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert!(error.to_string().contains("Payment"));
        assert!(error.to_string().contains("123"));
    }

    #[test]
    fn test_port_error_transient() {
        assert!(PortError::connection("pool timed out").is_transient());

        let validation = PortError::validation("negative balance");
        assert!(!validation.is_transient());
    }

    #[test]
    fn test_adapter_type_display() {
        assert_eq!(AdapterType::Internal.to_string(), "internal");
        assert_eq!(AdapterType::Mock.to_string(), "mock");
    }
}
