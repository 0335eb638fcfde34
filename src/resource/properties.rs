//! Writable container properties.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CosmosError;
use crate::request::coerce_integer;
use crate::resource::PartitionKeyDefinition;

/// The caller-settable properties of a container.
///
/// Unset properties are omitted from the request body. An explicit
/// `default_ttl` of `0` is sent as `0`.
///
/// # Example
///
/// ```rust
/// use cosmosdb::resource::{ContainerProperties, PartitionKeyDefinition};
/// use serde_json::json;
///
/// let properties = ContainerProperties::new("orders")
///     .with_partition_key(PartitionKeyDefinition::new("/customerId"))
///     .with_default_ttl(0);
///
/// let body = serde_json::to_value(&properties).unwrap();
/// assert_eq!(body["defaultTtl"], json!(0));
/// assert!(body.get("indexingPolicy").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    /// The container id.
    pub id: String,
    /// How items are partitioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyDefinition>,
    /// Indexing policy, passed through unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexing_policy: Option<Value>,
    /// Default item time-to-live in seconds (`-1` disables expiry).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<i64>,
    /// Conflict resolution policy, passed through unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_resolution_policy: Option<Value>,
}

impl ContainerProperties {
    /// Creates properties with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: None,
            indexing_policy: None,
            default_ttl: None,
            conflict_resolution_policy: None,
        }
    }

    /// Sets the partition key definition.
    #[must_use]
    pub fn with_partition_key(mut self, definition: PartitionKeyDefinition) -> Self {
        self.partition_key = Some(definition);
        self
    }

    /// Sets the indexing policy.
    #[must_use]
    pub fn with_indexing_policy(mut self, policy: Value) -> Self {
        self.indexing_policy = Some(policy);
        self
    }

    /// Sets the default time-to-live in seconds.
    #[must_use]
    pub const fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = Some(seconds);
        self
    }

    /// Sets the conflict resolution policy.
    #[must_use]
    pub fn with_conflict_resolution_policy(mut self, policy: Value) -> Self {
        self.conflict_resolution_policy = Some(policy);
        self
    }

    /// Sets the default time-to-live from an untyped value.
    ///
    /// Integers and integral strings are accepted; `null` clears the
    /// property.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidOption`] for fractional, non-numeric or
    /// out-of-range input.
    pub fn set_default_ttl_value(&mut self, value: &Value) -> Result<(), CosmosError> {
        self.default_ttl = coerce_integer("defaultTtl", value)?;
        Ok(())
    }
}
