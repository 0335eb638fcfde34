//! Partition keys, partition key definitions and physical key ranges.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A logical partition key value.
///
/// Serialized on the wire as a single-element JSON array, e.g. `["tenant-7"]`.
///
/// # Example
///
/// ```rust
/// use cosmosdb::resource::PartitionKey;
///
/// assert_eq!(PartitionKey::from("tenant-7").to_header_value(), r#"["tenant-7"]"#);
/// assert_eq!(PartitionKey::from(42).to_header_value(), "[42]");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(Value);

impl PartitionKey {
    /// Wraps an arbitrary JSON value as a partition key.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the underlying JSON value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }

    /// Returns the header encoding of this key.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        Value::Array(vec![self.0.clone()]).to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<i32> for PartitionKey {
    fn from(value: i32) -> Self {
        Self(Value::from(value))
    }
}

impl From<f64> for PartitionKey {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}

impl From<bool> for PartitionKey {
    fn from(value: bool) -> Self {
        Self(Value::Bool(value))
    }
}

/// How a container derives partition keys from its items.
///
/// # Example
///
/// ```rust
/// use cosmosdb::resource::{PartitionKey, PartitionKeyDefinition};
/// use serde_json::json;
///
/// let definition = PartitionKeyDefinition::new("/address/city");
/// let item = json!({"id": "1", "address": {"city": "Oslo"}});
/// assert_eq!(definition.extract(&item), Some(PartitionKey::from("Oslo")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    /// JSON pointer-like paths, e.g. `["/tenantId"]`.
    pub paths: Vec<String>,
    /// Partitioning scheme; the service uses `"Hash"`.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Definition version, when the service reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

fn default_kind() -> String {
    "Hash".to_string()
}

impl PartitionKeyDefinition {
    /// Creates a hash partition key definition over a single path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            paths: vec![path.into()],
            kind: default_kind(),
            version: None,
        }
    }

    /// Extracts the partition key of `item` using the first path.
    ///
    /// Returns `None` when the path is missing from the item.
    #[must_use]
    pub fn extract(&self, item: &Value) -> Option<PartitionKey> {
        let path = self.paths.first()?;
        let mut current = item;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.get(segment)?;
        }
        Some(PartitionKey(current.clone()))
    }
}

/// A physical partition of a container, covering the effective partition
/// key interval `[min_inclusive, max_exclusive)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKeyRange {
    /// The range id assigned by the service.
    pub id: String,
    /// Inclusive lower bound (hex-encoded effective partition key).
    #[serde(rename = "minInclusive")]
    pub min_inclusive: String,
    /// Exclusive upper bound (hex-encoded effective partition key).
    #[serde(rename = "maxExclusive")]
    pub max_exclusive: String,
    /// Ids of the ranges this one was split from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl PartitionKeyRange {
    /// The upper bound of the last range of every container.
    pub const MAX_EXCLUSIVE: &'static str = "FF";

    /// Creates a range.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        min_inclusive: impl Into<String>,
        max_exclusive: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            min_inclusive: min_inclusive.into(),
            max_exclusive: max_exclusive.into(),
            parents: Vec::new(),
        }
    }

    /// Returns `true` if the two ranges share any key.
    ///
    /// Bounds are compared as upper-case hex strings of equal significance,
    /// which the service guarantees; the empty string is the global minimum.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_inclusive.as_str() < other.max_exclusive.as_str()
            && other.min_inclusive.as_str() < self.max_exclusive.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_value_is_json_array() {
        assert_eq!(PartitionKey::from("a\"b").to_header_value(), r#"["a\"b"]"#);
        assert_eq!(PartitionKey::from(true).to_header_value(), "[true]");
        assert_eq!(PartitionKey::new(Value::Null).to_header_value(), "[null]");
    }

    #[test]
    fn test_extract_missing_path_returns_none() {
        let definition = PartitionKeyDefinition::new("/tenantId");
        assert_eq!(definition.extract(&json!({"id": "1"})), None);
    }

    #[test]
    fn test_extract_numeric_key() {
        let definition = PartitionKeyDefinition::new("/year");
        assert_eq!(
            definition.extract(&json!({"id": "1", "year": 2024})),
            Some(PartitionKey::from(2024))
        );
    }

    #[test]
    fn test_definition_deserializes_service_shape() {
        let definition: PartitionKeyDefinition =
            serde_json::from_value(json!({"paths": ["/pk"], "kind": "Hash", "version": 2}))
                .unwrap();
        assert_eq!(definition.paths, vec!["/pk".to_string()]);
        assert_eq!(definition.version, Some(2));
    }

    #[test]
    fn test_range_deserializes_service_shape() {
        let range: PartitionKeyRange = serde_json::from_value(json!({
            "id": "3",
            "minInclusive": "",
            "maxExclusive": "7F",
            "parents": ["0"],
            "_rid": "ignored"
        }))
        .unwrap();
        assert_eq!(range.id, "3");
        assert_eq!(range.min_inclusive, "");
        assert_eq!(range.parents, vec!["0".to_string()]);
    }

    #[test]
    fn test_range_overlap() {
        let left = PartitionKeyRange::new("1", "", "7F");
        let right = PartitionKeyRange::new("2", "7F", "FF");
        let whole = PartitionKeyRange::new("0", "", "FF");

        assert!(!left.overlaps(&right));
        assert!(whole.overlaps(&left));
        assert!(whole.overlaps(&right));
    }
}
