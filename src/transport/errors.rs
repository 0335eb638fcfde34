//! Transport-level failures.

use std::time::Duration;

use thiserror::Error;

/// Sub-status: the partition key range addressed no longer exists.
pub const SUB_STATUS_PARTITION_KEY_RANGE_GONE: u32 = 1002;
/// Sub-status: the addressed range is completing a split.
pub const SUB_STATUS_COMPLETING_SPLIT: u32 = 1007;
/// Sub-status: the addressed range is completing a migration.
pub const SUB_STATUS_COMPLETING_PARTITION_MIGRATION: u32 = 1008;

/// A failed transport call.
///
/// The transport classifies every failure as retryable or not; the core
/// never retries point operations itself and re-issues query pages only
/// when `retryable` is set.
///
/// # Example
///
/// ```rust
/// use cosmosdb::transport::TransportError;
///
/// let throttled = TransportError::new(429, "Request rate is large");
/// assert!(throttled.retryable);
///
/// let gone = TransportError::new(410, "Partition key range gone").with_sub_status(1002);
/// assert!(gone.is_stale_partition_map());
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Request failed with status {status_code}: {message}")]
pub struct TransportError {
    /// HTTP status code (or the closest equivalent for network failures).
    pub status_code: u16,
    /// The service's `x-ms-substatus`, if any.
    pub sub_status: Option<u32>,
    /// Whether the same request may succeed if issued again.
    pub retryable: bool,
    /// Error message reported by the service or the network stack.
    pub message: String,
    /// Activity id of the failed request.
    pub activity_id: Option<String>,
    /// How long the service asked the caller to wait before retrying.
    pub retry_after: Option<Duration>,
}

impl TransportError {
    /// Creates an error, classifying retryability from the status code.
    #[must_use]
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            sub_status: None,
            retryable: Self::is_retryable_status(status_code),
            message: message.into(),
            activity_id: None,
            retry_after: None,
        }
    }

    /// Sets the sub-status.
    #[must_use]
    pub const fn with_sub_status(mut self, sub_status: u32) -> Self {
        self.sub_status = Some(sub_status);
        self
    }

    /// Sets the activity id.
    #[must_use]
    pub fn with_activity_id(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// Sets the wait the service requested before a retry.
    #[must_use]
    pub const fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Overrides the retry classification.
    #[must_use]
    pub const fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Returns `true` for throttling, timeouts and unavailability.
    #[must_use]
    pub const fn is_retryable_status(status_code: u16) -> bool {
        matches!(status_code, 408 | 429 | 449 | 503)
    }

    /// Returns `true` if the failure means the caller's partition map is
    /// out of date.
    #[must_use]
    pub fn is_stale_partition_map(&self) -> bool {
        self.status_code == 410
            && matches!(
                self.sub_status,
                Some(
                    SUB_STATUS_PARTITION_KEY_RANGE_GONE
                        | SUB_STATUS_COMPLETING_SPLIT
                        | SUB_STATUS_COMPLETING_PARTITION_MIGRATION
                )
            )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = if error.is_timeout() {
            408
        } else {
            error.status().map_or(503, |s| s.as_u16())
        };
        Self::new(status_code, error.to_string())
            .with_retryable(error.is_timeout() || error.is_connect())
    }
}
