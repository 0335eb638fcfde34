//! Consistency level definitions.
//!
//! This module provides the [`ConsistencyLevel`] enum used both as the
//! client-wide default and as a per-request override.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Read consistency level requested from the service.
///
/// Levels are ordered from strongest to weakest. A request may only relax
/// the account's consistency, never strengthen it; the service enforces
/// that, the client just forwards the value.
///
/// # Example
///
/// ```rust
/// use cosmosdb::ConsistencyLevel;
///
/// let level: ConsistencyLevel = "Session".parse().unwrap();
/// assert_eq!(level, ConsistencyLevel::Session);
/// assert!(level.uses_session_token());
/// assert_eq!(ConsistencyLevel::BoundedStaleness.to_string(), "BoundedStaleness");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsistencyLevel {
    /// Linearizable reads.
    Strong,
    /// Reads lag writes by at most a configured window.
    BoundedStaleness,
    /// Read-your-writes within a session (the service default).
    #[default]
    Session,
    /// Reads never see out-of-order writes.
    ConsistentPrefix,
    /// No ordering guarantee.
    Eventual,
}

impl ConsistencyLevel {
    /// Returns the level as the service spells it.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "Strong",
            Self::BoundedStaleness => "BoundedStaleness",
            Self::Session => "Session",
            Self::ConsistentPrefix => "ConsistentPrefix",
            Self::Eventual => "Eventual",
        }
    }

    /// Returns `true` if requests at this level carry a session token.
    #[must_use]
    pub const fn uses_session_token(&self) -> bool {
        matches!(self, Self::Session)
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "boundedstaleness" => Ok(Self::BoundedStaleness),
            "session" => Ok(Self::Session),
            "consistentprefix" => Ok(Self::ConsistentPrefix),
            "eventual" => Ok(Self::Eventual),
            _ => Err(ConfigError::InvalidConsistencyLevel {
                level: s.to_string(),
            }),
        }
    }
}

impl Serialize for ConsistencyLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConsistencyLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
