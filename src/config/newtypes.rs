//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around the account endpoint and
//! account key. Invalid values are rejected on construction.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::ConfigError;

/// A validated Cosmos DB account endpoint.
///
/// The endpoint must carry an `http` or `https` scheme and a host. A trailing
/// slash is trimmed so links can be appended with a single `/`.
///
/// # Example
///
/// ```rust
/// use cosmosdb::AccountEndpoint;
///
/// let endpoint = AccountEndpoint::new("https://myaccount.documents.azure.com:443/").unwrap();
/// assert_eq!(endpoint.as_ref(), "https://myaccount.documents.azure.com:443");
/// assert_eq!(endpoint.scheme(), "https");
/// assert_eq!(endpoint.host_name(), "myaccount.documents.azure.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountEndpoint {
    url: String,
    scheme_end: usize,
    host_start: usize,
    host_end: usize,
}

impl AccountEndpoint {
    /// Creates a new validated account endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] if the URL is malformed or
    /// uses a scheme other than `http`/`https`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        let url = endpoint.trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidEndpoint {
            endpoint: endpoint.clone(),
        };

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        let scheme = &url[..scheme_end];
        if !scheme.eq_ignore_ascii_case("https") && !scheme.eq_ignore_ascii_case("http") {
            return Err(invalid());
        }

        let host_start = scheme_end + 3;
        if host_start >= url.len() {
            return Err(invalid());
        }

        // Host ends at port, path, query, or end of string
        let remainder = &url[host_start..];
        let host_end = remainder
            .find([':', '/', '?', '#'])
            .map_or(url.len(), |i| host_start + i);
        if host_end == host_start {
            return Err(invalid());
        }

        Ok(Self {
            url,
            scheme_end,
            host_start,
            host_end,
        })
    }

    /// Returns the URL scheme (e.g., "https").
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name portion of the endpoint.
    ///
    /// The host name is the account scope of every resource identity
    /// created through a client.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.host_start..self.host_end]
    }

    /// Joins a resource link onto the endpoint.
    #[must_use]
    pub fn join(&self, link: &str) -> String {
        let link = link.trim_start_matches('/');
        if link.is_empty() {
            format!("{}/", self.url)
        } else {
            format!("{}/{link}", self.url)
        }
    }
}

impl AsRef<str> for AccountEndpoint {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for AccountEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Serialize for AccountEndpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.url)
    }
}

impl<'de> Deserialize<'de> for AccountEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

/// A validated Cosmos DB account (master) key.
///
/// The key must be non-empty base64. The decoded bytes are kept for request
/// signing.
///
/// # Security
///
/// The `Debug` implementation masks the key, displaying only
/// `AccountKey(*****)`.
///
/// # Example
///
/// ```rust
/// use cosmosdb::AccountKey;
///
/// let key = AccountKey::new("c2VjcmV0LWtleQ==").unwrap();
/// assert_eq!(key.decoded(), b"secret-key");
/// assert_eq!(format!("{:?}", key), "AccountKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AccountKey {
    encoded: String,
    decoded: Vec<u8>,
}

impl AccountKey {
    /// Creates a new validated account key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyAccountKey`] if the key is empty, or
    /// [`ConfigError::InvalidAccountKey`] if it is not valid base64.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let encoded = key.into().trim().to_string();
        if encoded.is_empty() {
            return Err(ConfigError::EmptyAccountKey);
        }
        let decoded = STANDARD
            .decode(&encoded)
            .map_err(|_| ConfigError::InvalidAccountKey)?;
        Ok(Self { encoded, decoded })
    }

    /// Returns the decoded key bytes used for HMAC signing.
    #[must_use]
    pub fn decoded(&self) -> &[u8] {
        &self.decoded
    }
}

impl AsRef<str> for AccountKey {
    fn as_ref(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountKey(*****)")
    }
}
