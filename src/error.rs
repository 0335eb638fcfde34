//! Error types for the Cosmos DB client.
//!
//! This module contains the configuration errors raised while building a
//! client and the [`CosmosError`] taxonomy every operation returns.
//!
//! # Error Handling
//!
//! Every failure carries structured detail (the offending link, option or
//! partition, plus the status code for service failures) so callers can tell
//! "already exists" from "transient" from "malformed request" without
//! matching on message text.
//!
//! # Example
//!
//! ```rust
//! use cosmosdb::{AccountKey, ConfigError};
//!
//! let result = AccountKey::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyAccountKey)));
//! ```

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur while configuring the client.
///
/// Each variant provides a clear, actionable error message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Account key cannot be empty.
    #[error("Account key cannot be empty. Please provide the primary or secondary key of the account.")]
    EmptyAccountKey,

    /// Account key is not valid base64.
    #[error("Account key is not valid base64. Copy the key exactly as shown in the portal.")]
    InvalidAccountKey,

    /// Account endpoint is invalid.
    #[error("Invalid account endpoint '{endpoint}'. Expected format: 'https://<account>.documents.azure.com:443'.")]
    InvalidEndpoint {
        /// The invalid endpoint that was provided.
        endpoint: String,
    },

    /// Consistency level is not one of the service's levels.
    #[error("Invalid consistency level '{level}'. Expected one of Strong, BoundedStaleness, Session, ConsistentPrefix, Eventual.")]
    InvalidConsistencyLevel {
        /// The invalid level that was provided.
        level: String,
    },

    /// Connection string could not be parsed.
    #[error("Invalid connection string: {reason}")]
    InvalidConnectionString {
        /// The reason the connection string was rejected.
        reason: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },
}

/// Error type for every client operation.
///
/// Variants map one-to-one onto the failure categories a caller needs to
/// react to. Service failures that do not have a dedicated variant are kept
/// as [`CosmosError::Transport`] with their status code and retry
/// classification intact.
///
/// # Example
///
/// ```rust
/// use cosmosdb::CosmosError;
///
/// let error = CosmosError::AlreadyExists {
///     link: "dbs/products".to_string(),
/// };
/// assert_eq!(error.status_code(), Some(409));
/// assert!(!error.is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum CosmosError {
    /// An id is empty or contains a reserved character.
    #[error("Invalid resource id '{id}': {reason}")]
    InvalidIdentity {
        /// The rejected id.
        id: String,
        /// Why the id was rejected.
        reason: &'static str,
    },

    /// A request option is unknown, malformed, or not valid for the call.
    #[error("Invalid request option '{option}': {reason}")]
    InvalidOption {
        /// The option name as supplied by the caller.
        option: String,
        /// Why the option was rejected.
        reason: String,
    },

    /// A create conflicted with an existing resource (HTTP 409).
    #[error("Resource {link} already exists")]
    AlreadyExists {
        /// Link of the conflicting resource.
        link: String,
    },

    /// The resource does not exist (HTTP 404).
    #[error("Resource {link} not found")]
    NotFound {
        /// Link of the missing resource.
        link: String,
    },

    /// An `If-Match`/`If-None-Match` precondition failed (HTTP 412).
    #[error("Access condition failed for {link}")]
    AccessConditionFailed {
        /// Link of the resource whose etag did not match.
        link: String,
    },

    /// A query without a partition key was issued without enabling
    /// cross-partition execution.
    #[error("Query against {link} spans partitions; set a partition key or enable cross-partition query")]
    CrossPartitionRequired {
        /// Link of the queried container.
        link: String,
    },

    /// The partition map of a container changed underneath a request.
    #[error("Partition map of {link} is stale")]
    StalePartitionMap {
        /// Link of the container whose map went stale.
        link: String,
    },

    /// A partition fetch failed while executing a query.
    #[error("Query failed on partition {partition}: {cause}")]
    QueryFailed {
        /// The partition range (or partition key) that failed.
        partition: String,
        /// The underlying failure.
        cause: Box<CosmosError>,
    },

    /// Any other service or network failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CosmosError {
    /// Returns the HTTP status code associated with this failure, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::AlreadyExists { .. } => Some(409),
            Self::NotFound { .. } => Some(404),
            Self::AccessConditionFailed { .. } => Some(412),
            Self::StalePartitionMap { .. } => Some(410),
            Self::QueryFailed { cause, .. } => cause.status_code(),
            Self::Transport(e) => Some(e.status_code),
            _ => None,
        }
    }

    /// Returns `true` if the transport classified the failure as retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.retryable,
            Self::QueryFailed { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    /// Returns the link of the resource the failure refers to, if any.
    #[must_use]
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::AlreadyExists { link }
            | Self::NotFound { link }
            | Self::AccessConditionFailed { link }
            | Self::CrossPartitionRequired { link }
            | Self::StalePartitionMap { link } => Some(link),
            Self::QueryFailed { cause, .. } => cause.link(),
            _ => None,
        }
    }

    pub(crate) fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

// Verify error types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConfigError>();
    assert_send_sync::<CosmosError>();
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_account_key_error_message() {
        let message = ConfigError::EmptyAccountKey.to_string();
        assert!(message.contains("Account key cannot be empty"));
    }

    #[test]
    fn test_missing_required_field_error_message() {
        let error = ConfigError::MissingRequiredField { field: "endpoint" };
        let message = error.to_string();
        assert!(message.contains("endpoint"));
        assert!(message.contains("must be set"));
    }

    #[test]
    fn test_status_codes_for_semantic_variants() {
        let exists = CosmosError::AlreadyExists {
            link: "dbs/a".to_string(),
        };
        let missing = CosmosError::NotFound {
            link: "dbs/a".to_string(),
        };
        let precondition = CosmosError::AccessConditionFailed {
            link: "dbs/a/colls/b/docs/c".to_string(),
        };

        assert_eq!(exists.status_code(), Some(409));
        assert_eq!(missing.status_code(), Some(404));
        assert_eq!(precondition.status_code(), Some(412));
        assert_eq!(exists.link(), Some("dbs/a"));
    }

    #[test]
    fn test_query_failed_delegates_to_cause() {
        let error = CosmosError::QueryFailed {
            partition: "3".to_string(),
            cause: Box::new(CosmosError::Transport(TransportError::new(
                503,
                "service unavailable",
            ))),
        };

        assert_eq!(error.status_code(), Some(503));
        assert!(error.is_retryable());
        assert!(error.to_string().contains("partition 3"));
    }

    #[test]
    fn test_invalid_option_message_names_the_option() {
        let error = CosmosError::invalid_option("maxItemCount", "expected an integer");
        assert!(error.to_string().contains("maxItemCount"));
        assert!(error.to_string().contains("expected an integer"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let _: &dyn std::error::Error = &ConfigError::EmptyAccountKey;
        let _: &dyn std::error::Error = &CosmosError::CrossPartitionRequired {
            link: "dbs/a/colls/b".to_string(),
        };
    }
}
