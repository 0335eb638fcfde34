//! Request options and their composition into a per-call option set.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConsistencyLevel;
use crate::error::CosmosError;
use crate::resource::PartitionKey;

/// The closed set of options a request may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestOption {
    /// Logical partition key the call targets.
    PartitionKey,
    /// Session token to read at least as fresh as.
    SessionToken,
    /// Per-call consistency override.
    ConsistencyLevel,
    /// Opts out of RU/minute burst capacity.
    DisableRuPerMinuteUsage,
    /// Allows a query to fan out over every partition.
    EnableCrossPartitionQuery,
    /// Parallel partition fetches of a query.
    MaxDegreeOfParallelism,
    /// Maximum items per page.
    MaxItemCount,
    /// Etag precondition.
    AccessCondition,
    /// Extra headers passed through to the transport.
    InitialHeaders,
    /// Requests server-side query metrics.
    PopulateQueryMetrics,
    /// Provisioned throughput of a new database or container.
    OfferThroughput,
    /// Continuation to resume a query or feed from.
    Continuation,
}

impl RequestOption {
    /// Every option, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::PartitionKey,
        Self::SessionToken,
        Self::ConsistencyLevel,
        Self::DisableRuPerMinuteUsage,
        Self::EnableCrossPartitionQuery,
        Self::MaxDegreeOfParallelism,
        Self::MaxItemCount,
        Self::AccessCondition,
        Self::InitialHeaders,
        Self::PopulateQueryMetrics,
        Self::OfferThroughput,
        Self::Continuation,
    ];

    /// Returns the option's wire name, e.g. `enableCrossPartitionQuery`.
    #[must_use]
    pub const fn wire_name(&self) -> &'static str {
        match self {
            Self::PartitionKey => "partitionKey",
            Self::SessionToken => "sessionToken",
            Self::ConsistencyLevel => "consistencyLevel",
            Self::DisableRuPerMinuteUsage => "disableRUPerMinuteUsage",
            Self::EnableCrossPartitionQuery => "enableCrossPartitionQuery",
            Self::MaxDegreeOfParallelism => "maxDegreeOfParallelism",
            Self::MaxItemCount => "maxItemCount",
            Self::AccessCondition => "accessCondition",
            Self::InitialHeaders => "initialHeaders",
            Self::PopulateQueryMetrics => "populateQueryMetrics",
            Self::OfferThroughput => "offerThroughput",
            Self::Continuation => "continuation",
        }
    }
}

impl fmt::Display for RequestOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for RequestOption {
    type Err = CosmosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|option| option.wire_name() == s)
            .ok_or_else(|| CosmosError::invalid_option(s, "unknown option"))
    }
}

/// An etag precondition on a write or read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "condition")]
pub enum AccessCondition {
    /// Proceed only if the resource's etag matches.
    IfMatch(String),
    /// Proceed only if the resource's etag differs.
    IfNoneMatch(String),
}

impl AccessCondition {
    /// Returns the HTTP header carrying the condition.
    #[must_use]
    pub const fn header_name(&self) -> &'static str {
        match self {
            Self::IfMatch(_) => "If-Match",
            Self::IfNoneMatch(_) => "If-None-Match",
        }
    }

    /// Returns the etag of the condition.
    #[must_use]
    pub fn etag(&self) -> &str {
        match self {
            Self::IfMatch(etag) | Self::IfNoneMatch(etag) => etag,
        }
    }
}

/// Per-call request options.
///
/// Every field is optional; an unset field is never sent. Values can be set
/// through the typed builder methods or by wire name with [`set`](Self::set).
///
/// # Example
///
/// ```rust
/// use cosmosdb::request::RequestOptions;
/// use serde_json::json;
///
/// let options = RequestOptions::from_json(&json!({
///     "enableCrossPartitionQuery": true,
///     "maxItemCount": "50"
/// }))
/// .unwrap();
/// assert_eq!(options.enable_cross_partition_query, Some(true));
/// assert_eq!(options.max_item_count, Some(50));
/// assert!(options.partition_key.is_none());
///
/// assert!(RequestOptions::from_json(&json!({"maxItemCount": 2.5})).is_err());
/// assert!(RequestOptions::from_json(&json!({"pageSize": 10})).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestOptions {
    /// Logical partition key the call targets.
    #[serde(rename = "partitionKey", skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKey>,
    /// Session token to read at least as fresh as.
    #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Per-call consistency override.
    #[serde(rename = "consistencyLevel", skip_serializing_if = "Option::is_none")]
    pub consistency_level: Option<ConsistencyLevel>,
    /// Opts out of RU/minute burst capacity.
    #[serde(
        rename = "disableRUPerMinuteUsage",
        skip_serializing_if = "Option::is_none"
    )]
    pub disable_ru_per_minute_usage: Option<bool>,
    /// Allows a query without a partition key to fan out.
    #[serde(
        rename = "enableCrossPartitionQuery",
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_cross_partition_query: Option<bool>,
    /// Zero or negative lets the executor choose.
    #[serde(
        rename = "maxDegreeOfParallelism",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_degree_of_parallelism: Option<i32>,
    /// Maximum items per page.
    #[serde(rename = "maxItemCount", skip_serializing_if = "Option::is_none")]
    pub max_item_count: Option<u32>,
    /// Etag precondition.
    #[serde(rename = "accessCondition", skip_serializing_if = "Option::is_none")]
    pub access_condition: Option<AccessCondition>,
    /// Extra headers passed through unchanged.
    #[serde(rename = "initialHeaders", skip_serializing_if = "Option::is_none")]
    pub initial_headers: Option<BTreeMap<String, String>>,
    /// Requests server-side query metrics.
    #[serde(
        rename = "populateQueryMetrics",
        skip_serializing_if = "Option::is_none"
    )]
    pub populate_query_metrics: Option<bool>,
    /// Provisioned throughput for a new database or container.
    #[serde(rename = "offerThroughput", skip_serializing_if = "Option::is_none")]
    pub offer_throughput: Option<u32>,
    /// Continuation to resume from.
    #[serde(rename = "continuation", skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

impl RequestOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from a JSON object keyed by wire name.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidOption`] if the value is not an object,
    /// names an unknown option, or carries a malformed value.
    pub fn from_json(value: &Value) -> Result<Self, CosmosError> {
        let Value::Object(map) = value else {
            return Err(CosmosError::invalid_option(
                "options",
                "expected a JSON object keyed by option name",
            ));
        };
        let mut options = Self::new();
        for (name, value) in map {
            options.set(name, value)?;
        }
        Ok(options)
    }

    /// Sets an option by wire name. A `null` value unsets it.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidOption`] for unknown names and for
    /// values of the wrong shape. Numbers must be whole; integral strings
    /// are accepted, anything else is rejected rather than truncated.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<(), CosmosError> {
        let option: RequestOption = name.parse()?;
        match option {
            RequestOption::PartitionKey => {
                self.partition_key = (!value.is_null()).then(|| PartitionKey::new(value.clone()));
            }
            RequestOption::SessionToken => self.session_token = coerce_string(name, value)?,
            RequestOption::ConsistencyLevel => {
                self.consistency_level = coerce_string(name, value)?
                    .map(|level| level.parse::<ConsistencyLevel>())
                    .transpose()
                    .map_err(|e| CosmosError::invalid_option(name, e.to_string()))?;
            }
            RequestOption::DisableRuPerMinuteUsage => {
                self.disable_ru_per_minute_usage = coerce_bool(name, value)?;
            }
            RequestOption::EnableCrossPartitionQuery => {
                self.enable_cross_partition_query = coerce_bool(name, value)?;
            }
            RequestOption::MaxDegreeOfParallelism => {
                self.max_degree_of_parallelism = coerce_bounded(name, value)?;
            }
            RequestOption::MaxItemCount => self.max_item_count = coerce_bounded(name, value)?,
            RequestOption::AccessCondition => {
                self.access_condition = if value.is_null() {
                    None
                } else {
                    Some(
                        serde_json::from_value(value.clone())
                            .map_err(|e| CosmosError::invalid_option(name, e.to_string()))?,
                    )
                };
            }
            RequestOption::InitialHeaders => {
                self.initial_headers = coerce_headers(name, value)?;
            }
            RequestOption::PopulateQueryMetrics => {
                self.populate_query_metrics = coerce_bool(name, value)?;
            }
            RequestOption::OfferThroughput => {
                self.offer_throughput = coerce_bounded(name, value)?;
            }
            RequestOption::Continuation => self.continuation = coerce_string(name, value)?,
        }
        Ok(())
    }

    /// Returns `true` if `option` is set.
    #[must_use]
    pub fn is_set(&self, option: RequestOption) -> bool {
        match option {
            RequestOption::PartitionKey => self.partition_key.is_some(),
            RequestOption::SessionToken => self.session_token.is_some(),
            RequestOption::ConsistencyLevel => self.consistency_level.is_some(),
            RequestOption::DisableRuPerMinuteUsage => self.disable_ru_per_minute_usage.is_some(),
            RequestOption::EnableCrossPartitionQuery => {
                self.enable_cross_partition_query.is_some()
            }
            RequestOption::MaxDegreeOfParallelism => self.max_degree_of_parallelism.is_some(),
            RequestOption::MaxItemCount => self.max_item_count.is_some(),
            RequestOption::AccessCondition => self.access_condition.is_some(),
            RequestOption::InitialHeaders => self.initial_headers.is_some(),
            RequestOption::PopulateQueryMetrics => self.populate_query_metrics.is_some(),
            RequestOption::OfferThroughput => self.offer_throughput.is_some(),
            RequestOption::Continuation => self.continuation.is_some(),
        }
    }

    /// Iterates over the options that are set.
    pub fn keys(&self) -> impl Iterator<Item = RequestOption> + '_ {
        RequestOption::ALL
            .into_iter()
            .filter(move |option| self.is_set(*option))
    }

    /// Sets the partition key.
    #[must_use]
    pub fn with_partition_key(mut self, key: impl Into<PartitionKey>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Overrides the consistency level for this call.
    #[must_use]
    pub const fn with_consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    /// Enables or disables cross-partition query execution.
    #[must_use]
    pub const fn with_cross_partition_query(mut self, enabled: bool) -> Self {
        self.enable_cross_partition_query = Some(enabled);
        self
    }

    /// Sets the parallel partition fetch bound.
    #[must_use]
    pub const fn with_max_degree_of_parallelism(mut self, value: i32) -> Self {
        self.max_degree_of_parallelism = Some(value);
        self
    }

    /// Sets the maximum page size.
    #[must_use]
    pub const fn with_max_item_count(mut self, value: u32) -> Self {
        self.max_item_count = Some(value);
        self
    }

    /// Sets an etag precondition.
    #[must_use]
    pub fn with_access_condition(mut self, condition: AccessCondition) -> Self {
        self.access_condition = Some(condition);
        self
    }

    /// Adds a pass-through header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.initial_headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Requests query metrics.
    #[must_use]
    pub const fn with_query_metrics(mut self, enabled: bool) -> Self {
        self.populate_query_metrics = Some(enabled);
        self
    }

    /// Sets provisioned throughput.
    #[must_use]
    pub const fn with_offer_throughput(mut self, value: u32) -> Self {
        self.offer_throughput = Some(value);
        self
    }

    /// Resumes from a continuation token.
    #[must_use]
    pub fn with_continuation(mut self, token: impl Into<String>) -> Self {
        self.continuation = Some(token.into());
        self
    }

    fn clear(&mut self, option: RequestOption) {
        match option {
            RequestOption::PartitionKey => self.partition_key = None,
            RequestOption::SessionToken => self.session_token = None,
            RequestOption::ConsistencyLevel => self.consistency_level = None,
            RequestOption::DisableRuPerMinuteUsage => self.disable_ru_per_minute_usage = None,
            RequestOption::EnableCrossPartitionQuery => self.enable_cross_partition_query = None,
            RequestOption::MaxDegreeOfParallelism => self.max_degree_of_parallelism = None,
            RequestOption::MaxItemCount => self.max_item_count = None,
            RequestOption::AccessCondition => self.access_condition = None,
            RequestOption::InitialHeaders => self.initial_headers = None,
            RequestOption::PopulateQueryMetrics => self.populate_query_metrics = None,
            RequestOption::OfferThroughput => self.offer_throughput = None,
            RequestOption::Continuation => self.continuation = None,
        }
    }
}

/// Client-level defaults merged under explicit options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionDefaults {
    /// Last session token observed for the target container.
    pub session_token: Option<String>,
    /// The client's consistency level.
    pub consistency_level: Option<ConsistencyLevel>,
    /// Client-wide page size.
    pub max_item_count: Option<u32>,
    /// Client-wide parallelism bound.
    pub max_degree_of_parallelism: Option<i32>,
}

/// The kind of call an option set is composed for.
///
/// Each scope accepts a fixed subset of [`RequestOption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationScope {
    /// Create, upsert or replace of a database or user.
    DatabaseWrite,
    /// Create or replace of a container.
    ContainerWrite,
    /// Read of a database, container or user.
    ResourceRead,
    /// Delete of a database, container or user.
    ResourceDelete,
    /// Point read of an item.
    ItemRead,
    /// Create, replace, upsert or delete of an item.
    ItemWrite,
    /// Create, replace or upsert of a stored procedure, trigger or
    /// user-defined function.
    ScriptWrite,
    /// Query or listing.
    Query,
    /// Incremental change feed read.
    ChangeFeed,
}

impl OperationScope {
    /// Returns the options this scope accepts.
    #[must_use]
    pub const fn allowed(&self) -> &'static [RequestOption] {
        use RequestOption as O;
        match self {
            Self::DatabaseWrite | Self::ContainerWrite => &[
                O::SessionToken,
                O::AccessCondition,
                O::InitialHeaders,
                O::PopulateQueryMetrics,
                O::OfferThroughput,
            ],
            Self::ResourceRead => &[
                O::SessionToken,
                O::ConsistencyLevel,
                O::AccessCondition,
                O::InitialHeaders,
                O::PopulateQueryMetrics,
            ],
            Self::ResourceDelete | Self::ScriptWrite => &[
                O::SessionToken,
                O::AccessCondition,
                O::InitialHeaders,
                O::PopulateQueryMetrics,
            ],
            Self::ItemRead => &[
                O::PartitionKey,
                O::SessionToken,
                O::ConsistencyLevel,
                O::AccessCondition,
                O::InitialHeaders,
                O::PopulateQueryMetrics,
            ],
            Self::ItemWrite => &[
                O::PartitionKey,
                O::SessionToken,
                O::DisableRuPerMinuteUsage,
                O::AccessCondition,
                O::InitialHeaders,
                O::PopulateQueryMetrics,
            ],
            Self::Query => &[
                O::PartitionKey,
                O::SessionToken,
                O::ConsistencyLevel,
                O::DisableRuPerMinuteUsage,
                O::EnableCrossPartitionQuery,
                O::MaxDegreeOfParallelism,
                O::MaxItemCount,
                O::InitialHeaders,
                O::PopulateQueryMetrics,
                O::Continuation,
            ],
            Self::ChangeFeed => &[
                O::PartitionKey,
                O::SessionToken,
                O::ConsistencyLevel,
                O::MaxDegreeOfParallelism,
                O::MaxItemCount,
                O::InitialHeaders,
                O::Continuation,
            ],
        }
    }

    /// Returns `true` if this scope accepts `option`.
    #[must_use]
    pub fn allows(&self, option: RequestOption) -> bool {
        self.allowed().contains(&option)
    }
}

impl fmt::Display for OperationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DatabaseWrite => "database write",
            Self::ContainerWrite => "container write",
            Self::ResourceRead => "resource read",
            Self::ResourceDelete => "resource delete",
            Self::ItemRead => "item read",
            Self::ItemWrite => "item write",
            Self::ScriptWrite => "script write",
            Self::Query => "query",
            Self::ChangeFeed => "change feed",
        };
        f.write_str(name)
    }
}

/// The composed, transport-ready options of one call.
///
/// Immutable once built; the transport only reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    options: RequestOptions,
}

impl OptionSet {
    /// Returns the composed options.
    #[must_use]
    pub const fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Returns `true` if `option` is present.
    #[must_use]
    pub fn contains(&self, option: RequestOption) -> bool {
        self.options.is_set(option)
    }

    /// Iterates over the options present.
    pub fn keys(&self) -> impl Iterator<Item = RequestOption> + '_ {
        self.options.keys()
    }

    /// Returns `true` if no option is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }

    /// Returns the options as a JSON object keyed by wire name.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.options).unwrap_or(Value::Null)
    }

    /// Returns a copy with `continuation` replaced.
    ///
    /// The query executor uses this to address one partition's next page
    /// without re-composing.
    #[must_use]
    pub fn with_continuation(&self, continuation: Option<String>) -> Self {
        let mut options = self.options.clone();
        options.continuation = continuation;
        Self { options }
    }
}

/// Composes explicit per-call options over client defaults.
///
/// For every option the explicit value wins, then the default, and
/// otherwise the option is absent. The session token default applies only
/// when the effective consistency level is `Session`.
///
/// # Errors
///
/// Returns [`CosmosError::InvalidOption`] if an explicit option is not
/// accepted by `scope`. Defaults outside the scope are skipped.
///
/// # Example
///
/// ```rust
/// use cosmosdb::request::{compose, OperationScope, OptionDefaults, RequestOption, RequestOptions};
/// use cosmosdb::ConsistencyLevel;
///
/// let defaults = OptionDefaults {
///     session_token: Some("0:1#10".to_string()),
///     consistency_level: Some(ConsistencyLevel::Session),
///     ..OptionDefaults::default()
/// };
/// let explicit = RequestOptions::new().with_partition_key("tenant-1");
///
/// let set = compose(&explicit, &defaults, OperationScope::ItemRead).unwrap();
/// assert_eq!(set.options().session_token.as_deref(), Some("0:1#10"));
/// assert!(!set.contains(RequestOption::MaxItemCount));
/// ```
pub fn compose(
    explicit: &RequestOptions,
    defaults: &OptionDefaults,
    scope: OperationScope,
) -> Result<OptionSet, CosmosError> {
    if let Some(rejected) = explicit.keys().find(|option| !scope.allows(*option)) {
        return Err(CosmosError::invalid_option(
            rejected.wire_name(),
            format!("not supported by {scope} operations"),
        ));
    }

    let mut options = explicit.clone();
    if options.consistency_level.is_none() {
        options.consistency_level = defaults.consistency_level;
    }
    if options.max_item_count.is_none() {
        options.max_item_count = defaults.max_item_count;
    }
    if options.max_degree_of_parallelism.is_none() {
        options.max_degree_of_parallelism = defaults.max_degree_of_parallelism;
    }
    let session = options
        .consistency_level
        .map_or(true, |level| level.uses_session_token());
    if options.session_token.is_none() && session {
        options.session_token.clone_from(&defaults.session_token);
    }

    for option in RequestOption::ALL {
        if !scope.allows(option) {
            options.clear(option);
        }
    }
    Ok(OptionSet { options })
}

/// Coerces a JSON value into a whole number.
///
/// `null` yields `None`. Whole numbers and integral strings are accepted;
/// fractional numbers, other strings and other types are rejected.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn coerce_integer(option: &str, value: &Value) -> Result<Option<i64>, CosmosError> {
    let not_integer =
        || CosmosError::invalid_option(option, format!("expected a whole number, got {value}"));
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(n), _) => Ok(Some(n)),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Some(f as i64)),
            _ => Err(not_integer()),
        },
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| not_integer()),
        _ => Err(not_integer()),
    }
}

fn coerce_bounded<T: TryFrom<i64>>(option: &str, value: &Value) -> Result<Option<T>, CosmosError> {
    coerce_integer(option, value)?
        .map(|n| {
            T::try_from(n)
                .map_err(|_| CosmosError::invalid_option(option, format!("{n} is out of range")))
        })
        .transpose()
}

fn coerce_bool(option: &str, value: &Value) -> Result<Option<bool>, CosmosError> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        _ => Err(CosmosError::invalid_option(
            option,
            format!("expected a boolean, got {value}"),
        )),
    }
}

fn coerce_string(option: &str, value: &Value) -> Result<Option<String>, CosmosError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(CosmosError::invalid_option(
            option,
            format!("expected a string, got {value}"),
        )),
    }
}

fn coerce_headers(
    option: &str,
    value: &Value,
) -> Result<Option<BTreeMap<String, String>>, CosmosError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(
            map.iter()
                .map(|(name, value)| {
                    let value = value
                        .as_str()
                        .map_or_else(|| value.to_string(), str::to_string);
                    (name.clone(), value)
                })
                .collect(),
        )),
        _ => Err(CosmosError::invalid_option(
            option,
            "expected an object of header names to values",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_defaults() -> OptionDefaults {
        OptionDefaults {
            session_token: Some("0:1#42".to_string()),
            consistency_level: Some(ConsistencyLevel::Session),
            max_item_count: Some(25),
            max_degree_of_parallelism: None,
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for option in RequestOption::ALL {
            assert_eq!(option.wire_name().parse::<RequestOption>().unwrap(), option);
        }
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let result = RequestOptions::from_json(&json!({"maxItemCount": 10, "pageSize": 10}));
        assert!(matches!(
            result,
            Err(CosmosError::InvalidOption { ref option, .. }) if option == "pageSize"
        ));
    }

    #[test]
    fn test_numeric_coercion() {
        let mut options = RequestOptions::new();
        options.set("maxItemCount", &json!(" 40 ")).unwrap();
        assert_eq!(options.max_item_count, Some(40));
        options.set("maxDegreeOfParallelism", &json!(-1)).unwrap();
        assert_eq!(options.max_degree_of_parallelism, Some(-1));
        options.set("offerThroughput", &json!(400.0)).unwrap();
        assert_eq!(options.offer_throughput, Some(400));

        for bad in [json!("ten"), json!(2.5), json!(true), json!(-3)] {
            assert!(
                options.set("maxItemCount", &bad).is_err(),
                "{bad} should be rejected"
            );
        }
        assert_eq!(options.max_item_count, Some(40));
    }

    #[test]
    fn test_null_unsets() {
        let mut options = RequestOptions::new().with_partition_key("a");
        options.set("partitionKey", &Value::Null).unwrap();
        assert!(options.partition_key.is_none());
    }

    #[test]
    fn test_access_condition_from_json() {
        let options = RequestOptions::from_json(&json!({
            "accessCondition": {"type": "IfMatch", "condition": "\"etag-1\""}
        }))
        .unwrap();
        let condition = options.access_condition.unwrap();
        assert_eq!(condition.header_name(), "If-Match");
        assert_eq!(condition.etag(), "\"etag-1\"");

        let bad = RequestOptions::from_json(&json!({"accessCondition": {"type": "IfOlder"}}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_consistency_level_from_json() {
        let options = RequestOptions::from_json(&json!({"consistencyLevel": "eventual"})).unwrap();
        assert_eq!(options.consistency_level, Some(ConsistencyLevel::Eventual));
        assert!(RequestOptions::from_json(&json!({"consistencyLevel": "Linear"})).is_err());
    }

    #[test]
    fn test_explicit_wins_over_default() {
        let explicit = RequestOptions::new().with_session_token("0:1#99");
        let set = compose(&explicit, &session_defaults(), OperationScope::ItemRead).unwrap();
        assert_eq!(set.options().session_token.as_deref(), Some("0:1#99"));
    }

    #[test]
    fn test_absent_in_both_sources_is_absent() {
        let set = compose(
            &RequestOptions::new(),
            &OptionDefaults::default(),
            OperationScope::Query,
        )
        .unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_json(), json!({}));
    }

    #[test]
    fn test_falsy_explicit_values_are_kept() {
        let explicit = RequestOptions::new()
            .with_cross_partition_query(false)
            .with_max_degree_of_parallelism(0);
        let set = compose(&explicit, &OptionDefaults::default(), OperationScope::Query).unwrap();
        assert_eq!(
            set.to_json(),
            json!({"enableCrossPartitionQuery": false, "maxDegreeOfParallelism": 0})
        );
    }

    #[test]
    fn test_out_of_scope_explicit_option_is_rejected() {
        let explicit = RequestOptions::new().with_offer_throughput(400);
        let result = compose(&explicit, &OptionDefaults::default(), OperationScope::ItemWrite);
        assert!(matches!(
            result,
            Err(CosmosError::InvalidOption { ref option, .. }) if option == "offerThroughput"
        ));
    }

    #[test]
    fn test_script_writes_take_no_partition_key() {
        let explicit = RequestOptions::new().with_partition_key("tenant-1");
        let result = compose(&explicit, &OptionDefaults::default(), OperationScope::ScriptWrite);
        assert!(matches!(
            result,
            Err(CosmosError::InvalidOption { ref option, .. }) if option == "partitionKey"
        ));
        assert!(OperationScope::ScriptWrite.allows(RequestOption::AccessCondition));
        assert_eq!(OperationScope::ScriptWrite.to_string(), "script write");
    }

    #[test]
    fn test_out_of_scope_defaults_are_skipped() {
        let set = compose(
            &RequestOptions::new(),
            &session_defaults(),
            OperationScope::DatabaseWrite,
        )
        .unwrap();
        assert!(!set.contains(RequestOption::MaxItemCount));
        assert!(!set.contains(RequestOption::ConsistencyLevel));
        assert!(set.contains(RequestOption::SessionToken));
    }

    #[test]
    fn test_session_default_skipped_for_non_session_consistency() {
        let explicit = RequestOptions::new().with_consistency_level(ConsistencyLevel::Eventual);
        let set = compose(&explicit, &session_defaults(), OperationScope::ItemRead).unwrap();
        assert!(set.options().session_token.is_none());
    }

    #[test]
    fn test_keys_lists_only_present_options() {
        let set = compose(
            &RequestOptions::new().with_partition_key("p"),
            &session_defaults(),
            OperationScope::Query,
        )
        .unwrap();
        let keys: Vec<_> = set.keys().collect();
        assert_eq!(
            keys,
            vec![
                RequestOption::PartitionKey,
                RequestOption::SessionToken,
                RequestOption::ConsistencyLevel,
                RequestOption::MaxItemCount,
            ]
        );
    }
}
