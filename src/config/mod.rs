//! Configuration types for the Cosmos DB client.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`CosmosConfig`]: The configuration shared by every component of a client
//! - [`CosmosConfigBuilder`]: A builder for constructing [`CosmosConfig`] instances
//! - [`AccountEndpoint`]: A validated account endpoint URL
//! - [`AccountKey`]: A validated account key with masked debug output
//! - [`ConsistencyLevel`]: The default read consistency for the client
//! - [`ConnectionString`]: Parsed `AccountEndpoint=...;AccountKey=...` strings
//!
//! # Example
//!
//! ```rust
//! use cosmosdb::{AccountEndpoint, AccountKey, ConsistencyLevel, CosmosConfig};
//!
//! let config = CosmosConfig::builder()
//!     .endpoint(AccountEndpoint::new("https://acct.documents.azure.com").unwrap())
//!     .key(AccountKey::new("c2VjcmV0").unwrap())
//!     .consistency_level(ConsistencyLevel::Eventual)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.consistency_level(), ConsistencyLevel::Eventual);
//! ```

mod connection_string;
mod consistency;
mod newtypes;

pub use connection_string::ConnectionString;
pub use consistency::ConsistencyLevel;
pub use newtypes::{AccountEndpoint, AccountKey};

use std::time::Duration;

use crate::error::ConfigError;

/// Default number of partition-map refreshes a single query may perform.
pub const DEFAULT_PARTITION_MAP_REFRESH_LIMIT: u32 = 3;

/// Default number of re-issues for a retryable page failure.
pub const DEFAULT_PAGE_RETRY_LIMIT: u32 = 2;

/// Wait before re-issuing a page when the service gave no retry-after.
pub const DEFAULT_PAGE_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Configuration for the Cosmos DB client.
///
/// # Thread Safety
///
/// `CosmosConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks.
#[derive(Clone, Debug)]
pub struct CosmosConfig {
    endpoint: AccountEndpoint,
    key: AccountKey,
    consistency_level: ConsistencyLevel,
    max_degree_of_parallelism: i32,
    max_item_count: Option<u32>,
    partition_map_refresh_limit: u32,
    page_retry_limit: u32,
    page_retry_wait: Duration,
    request_timeout: Option<Duration>,
    user_agent_suffix: Option<String>,
}

impl CosmosConfig {
    /// Creates a new builder for constructing a `CosmosConfig`.
    #[must_use]
    pub fn builder() -> CosmosConfigBuilder {
        CosmosConfigBuilder::new()
    }

    /// Creates a configuration from a connection string, with defaults for
    /// everything else.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the connection string is malformed.
    pub fn from_connection_string(value: &str) -> Result<Self, ConfigError> {
        let parsed = ConnectionString::parse(value)?;
        Self::builder()
            .endpoint(parsed.endpoint)
            .key(parsed.key)
            .build()
    }

    /// Returns the account endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &AccountEndpoint {
        &self.endpoint
    }

    /// Returns the account key.
    #[must_use]
    pub const fn key(&self) -> &AccountKey {
        &self.key
    }

    /// Returns the default consistency level.
    #[must_use]
    pub const fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }

    /// Returns the default degree of parallelism for cross-partition queries.
    ///
    /// A non-positive value lets the query executor choose.
    #[must_use]
    pub const fn max_degree_of_parallelism(&self) -> i32 {
        self.max_degree_of_parallelism
    }

    /// Returns the default page size for feeds, if configured.
    #[must_use]
    pub const fn max_item_count(&self) -> Option<u32> {
        self.max_item_count
    }

    /// Returns how many partition-map refreshes a query may perform.
    #[must_use]
    pub const fn partition_map_refresh_limit(&self) -> u32 {
        self.partition_map_refresh_limit
    }

    /// Returns how many times a retryable page failure is re-issued.
    #[must_use]
    pub const fn page_retry_limit(&self) -> u32 {
        self.page_retry_limit
    }

    /// Returns the wait before re-issuing a page without a retry-after hint.
    #[must_use]
    pub const fn page_retry_wait(&self) -> Duration {
        self.page_retry_wait
    }

    /// Returns the per-request timeout handed to the transport.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Returns the user agent suffix, if configured.
    #[must_use]
    pub fn user_agent_suffix(&self) -> Option<&str> {
        self.user_agent_suffix.as_deref()
    }
}

// Verify CosmosConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CosmosConfig>();
};

/// Builder for constructing [`CosmosConfig`] instances.
///
/// Required fields are `endpoint` and `key`.
///
/// # Defaults
///
/// - `consistency_level`: [`ConsistencyLevel::Session`]
/// - `max_degree_of_parallelism`: `0` (executor chooses)
/// - `max_item_count`: `None` (service default)
/// - `partition_map_refresh_limit`: [`DEFAULT_PARTITION_MAP_REFRESH_LIMIT`]
/// - `page_retry_limit`: [`DEFAULT_PAGE_RETRY_LIMIT`]
/// - `page_retry_wait`: [`DEFAULT_PAGE_RETRY_WAIT`]
/// - `request_timeout`: `None`
/// - `user_agent_suffix`: `None`
#[derive(Debug, Default)]
pub struct CosmosConfigBuilder {
    endpoint: Option<AccountEndpoint>,
    key: Option<AccountKey>,
    consistency_level: Option<ConsistencyLevel>,
    max_degree_of_parallelism: Option<i32>,
    max_item_count: Option<u32>,
    partition_map_refresh_limit: Option<u32>,
    page_retry_limit: Option<u32>,
    page_retry_wait: Option<Duration>,
    request_timeout: Option<Duration>,
    user_agent_suffix: Option<String>,
}

impl CosmosConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the account endpoint (required).
    #[must_use]
    pub fn endpoint(mut self, endpoint: AccountEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the account key (required).
    #[must_use]
    pub fn key(mut self, key: AccountKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets the default consistency level.
    #[must_use]
    pub const fn consistency_level(mut self, level: ConsistencyLevel) -> Self {
        self.consistency_level = Some(level);
        self
    }

    /// Sets the default degree of parallelism for cross-partition queries.
    #[must_use]
    pub const fn max_degree_of_parallelism(mut self, value: i32) -> Self {
        self.max_degree_of_parallelism = Some(value);
        self
    }

    /// Sets the default page size for feeds.
    #[must_use]
    pub const fn max_item_count(mut self, value: u32) -> Self {
        self.max_item_count = Some(value);
        self
    }

    /// Sets how many partition-map refreshes a query may perform.
    #[must_use]
    pub const fn partition_map_refresh_limit(mut self, value: u32) -> Self {
        self.partition_map_refresh_limit = Some(value);
        self
    }

    /// Sets how many times a retryable page failure is re-issued.
    #[must_use]
    pub const fn page_retry_limit(mut self, value: u32) -> Self {
        self.page_retry_limit = Some(value);
        self
    }

    /// Sets the wait before re-issuing a page when the service sends no
    /// retry-after hint.
    #[must_use]
    pub const fn page_retry_wait(mut self, wait: Duration) -> Self {
        self.page_retry_wait = Some(wait);
        self
    }

    /// Sets the per-request timeout handed to the transport.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets a suffix appended to the `User-Agent` header.
    #[must_use]
    pub fn user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Builds the [`CosmosConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `endpoint` or `key`
    /// are not set.
    pub fn build(self) -> Result<CosmosConfig, ConfigError> {
        let endpoint = self
            .endpoint
            .ok_or(ConfigError::MissingRequiredField { field: "endpoint" })?;
        let key = self
            .key
            .ok_or(ConfigError::MissingRequiredField { field: "key" })?;

        Ok(CosmosConfig {
            endpoint,
            key,
            consistency_level: self.consistency_level.unwrap_or_default(),
            max_degree_of_parallelism: self.max_degree_of_parallelism.unwrap_or(0),
            max_item_count: self.max_item_count,
            partition_map_refresh_limit: self
                .partition_map_refresh_limit
                .unwrap_or(DEFAULT_PARTITION_MAP_REFRESH_LIMIT),
            page_retry_limit: self.page_retry_limit.unwrap_or(DEFAULT_PAGE_RETRY_LIMIT),
            page_retry_wait: self.page_retry_wait.unwrap_or(DEFAULT_PAGE_RETRY_WAIT),
            request_timeout: self.request_timeout,
            user_agent_suffix: self.user_agent_suffix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> AccountEndpoint {
        AccountEndpoint::new("https://acct.documents.azure.com").unwrap()
    }

    fn key() -> AccountKey {
        AccountKey::new("c2VjcmV0").unwrap()
    }

    #[test]
    fn test_builder_requires_endpoint() {
        let result = CosmosConfigBuilder::new().key(key()).build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { field: "endpoint" })
        ));
    }

    #[test]
    fn test_builder_requires_key() {
        let result = CosmosConfigBuilder::new().endpoint(endpoint()).build();
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { field: "key" })
        ));
    }

    #[test]
    fn test_builder_provides_sensible_defaults() {
        let config = CosmosConfig::builder()
            .endpoint(endpoint())
            .key(key())
            .build()
            .unwrap();

        assert_eq!(config.consistency_level(), ConsistencyLevel::Session);
        assert_eq!(config.max_degree_of_parallelism(), 0);
        assert!(config.max_item_count().is_none());
        assert_eq!(
            config.partition_map_refresh_limit(),
            DEFAULT_PARTITION_MAP_REFRESH_LIMIT
        );
        assert_eq!(config.page_retry_limit(), DEFAULT_PAGE_RETRY_LIMIT);
        assert_eq!(config.page_retry_wait(), DEFAULT_PAGE_RETRY_WAIT);
        assert!(config.request_timeout().is_none());
        assert!(config.user_agent_suffix().is_none());
    }

    #[test]
    fn test_builder_with_all_optional_fields() {
        let config = CosmosConfig::builder()
            .endpoint(endpoint())
            .key(key())
            .consistency_level(ConsistencyLevel::Strong)
            .max_degree_of_parallelism(4)
            .max_item_count(50)
            .partition_map_refresh_limit(5)
            .page_retry_limit(0)
            .page_retry_wait(Duration::from_millis(200))
            .request_timeout(Duration::from_secs(30))
            .user_agent_suffix("inventory-sync/2.1")
            .build()
            .unwrap();

        assert_eq!(config.consistency_level(), ConsistencyLevel::Strong);
        assert_eq!(config.max_degree_of_parallelism(), 4);
        assert_eq!(config.max_item_count(), Some(50));
        assert_eq!(config.partition_map_refresh_limit(), 5);
        assert_eq!(config.page_retry_limit(), 0);
        assert_eq!(config.page_retry_wait(), Duration::from_millis(200));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.user_agent_suffix(), Some("inventory-sync/2.1"));
    }

    #[test]
    fn test_from_connection_string() {
        let config = CosmosConfig::from_connection_string(
            "AccountEndpoint=https://acct.documents.azure.com:443/;AccountKey=c2VjcmV0;",
        )
        .unwrap();
        assert_eq!(config.endpoint().host_name(), "acct.documents.azure.com");
        assert_eq!(config.consistency_level(), ConsistencyLevel::Session);
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = CosmosConfig::builder()
            .endpoint(endpoint())
            .key(key())
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("CosmosConfig"));
        assert!(!debug.contains("c2VjcmV0"));
    }
}
