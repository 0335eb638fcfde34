//! Composite continuation tokens.
//!
//! A query spread over several partitions cannot be resumed from a single
//! service continuation. The composite token records, per live partition,
//! the service continuation that produced its current page and how many
//! items of that page were already handed out. It is base64-encoded JSON so
//! callers can treat it as opaque.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CosmosError;
use crate::request::RequestOption;

/// Resume point of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RangeContinuation {
    /// Range id, empty for a single logical partition.
    pub id: String,
    pub min: String,
    pub max: String,
    /// Service continuation to request, absent for the first page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Items of that page already delivered.
    #[serde(default)]
    pub skip: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CompositeContinuation {
    pub ranges: Vec<RangeContinuation>,
}

impl CompositeContinuation {
    pub(crate) fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub(crate) fn decode(token: &str) -> Result<Self, CosmosError> {
        let invalid = |reason: String| {
            CosmosError::invalid_option(RequestOption::Continuation.wire_name(), reason)
        };
        let bytes = STANDARD
            .decode(token.trim())
            .map_err(|e| invalid(format!("not a continuation issued by this client: {e}")))?;
        let decoded: Self = serde_json::from_slice(&bytes)
            .map_err(|e| invalid(format!("malformed continuation: {e}")))?;
        if decoded.ranges.is_empty() {
            return Err(invalid("continuation names no partitions".to_string()));
        }
        Ok(decoded)
    }
}
