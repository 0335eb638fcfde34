//! Connection string parsing.
//!
//! The portal hands out connection strings of the form
//! `AccountEndpoint=https://...;AccountKey=...;`. Keys are matched
//! case-insensitively; unknown keys are ignored.

use crate::config::{AccountEndpoint, AccountKey};
use crate::error::ConfigError;

/// The endpoint and key extracted from a connection string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionString {
    /// The account endpoint.
    pub endpoint: AccountEndpoint,
    /// The account key.
    pub key: AccountKey,
}

impl ConnectionString {
    /// Parses a connection string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConnectionString`] when a segment has no
    /// `=` or a required key is missing, and the newtype errors when the
    /// endpoint or key themselves are invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cosmosdb::config::ConnectionString;
    ///
    /// let parsed = ConnectionString::parse(
    ///     "AccountEndpoint=https://acct.documents.azure.com:443/;AccountKey=c2VjcmV0;",
    /// ).unwrap();
    /// assert_eq!(parsed.endpoint.host_name(), "acct.documents.azure.com");
    /// ```
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut key = None;

        for segment in value.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            // Keys are base64 and may themselves end in '='
            let (name, value) =
                segment
                    .split_once('=')
                    .ok_or_else(|| ConfigError::InvalidConnectionString {
                        reason: format!("segment '{segment}' is not a key=value pair"),
                    })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "accountendpoint" => endpoint = Some(AccountEndpoint::new(value)?),
                "accountkey" => key = Some(AccountKey::new(value)?),
                _ => {}
            }
        }

        Ok(Self {
            endpoint: endpoint.ok_or_else(|| ConfigError::InvalidConnectionString {
                reason: "missing AccountEndpoint".to_string(),
            })?,
            key: key.ok_or_else(|| ConfigError::InvalidConnectionString {
                reason: "missing AccountKey".to_string(),
            })?,
        })
    }
}
