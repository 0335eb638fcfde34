//! Response envelope and the response wrapper handed to callers.
//!
//! Every transport call produces a [`ResponseEnvelope`]: the payload plus
//! the metadata the service attaches to it (request charge, session token,
//! continuation, query metrics). Point operations hand the caller a
//! [`ResourceResponse<T>`], which implements `Deref<Target = T>` so the
//! payload can be used directly.
//!
//! # Example
//!
//! ```rust
//! use cosmosdb::resource::{ResourceResponse, ResponseEnvelope};
//! use serde_json::json;
//!
//! let envelope = ResponseEnvelope::new(201)
//!     .with_payload(json!({"id": "order-1", "total": 30}))
//!     .with_request_charge(6.29)
//!     .with_session_token("0:1#12#3=-1");
//!
//! let response = ResourceResponse::from_envelope(envelope);
//! assert_eq!(response["id"], "order-1"); // Deref to serde_json::Value
//! assert_eq!(response.request_charge(), 6.29);
//! assert_eq!(response.session_token(), Some("0:1#12#3=-1"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CosmosError;
use crate::resource::ResourceRef;

/// Server-side execution metrics of a query page.
///
/// The service reports them as `name=value` pairs separated by `;`, e.g.
/// `totalExecutionTimeInMs=0.33;retrievedDocumentCount=3`. Aggregation sums
/// each metric by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMetrics {
    values: BTreeMap<String, f64>,
}

impl QueryMetrics {
    /// Parses the `x-ms-documentdb-query-metrics` header format.
    ///
    /// Pairs whose value is not a number are skipped.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let values = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let value = value.trim().parse::<f64>().ok()?;
                Some((name.trim().to_string(), value))
            })
            .collect();
        Self { values }
    }

    /// Returns the value of a metric, if reported.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Adds every metric of `other` into `self`.
    pub fn accumulate(&mut self, other: &Self) {
        for (name, value) in &other.values {
            *self.values.entry(name.clone()).or_insert(0.0) += value;
        }
    }

    /// Returns `true` if no metric was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for QueryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(";")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// The uniform result of every transport call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    /// HTTP status code of the response.
    pub status_code: u16,
    /// Response body, if any.
    pub payload: Option<Value>,
    /// Request units consumed.
    pub request_charge: f64,
    /// Session token returned by the service.
    pub session_token: Option<String>,
    /// Continuation of a feed, if more pages remain.
    pub continuation: Option<String>,
    /// Etag of the resource.
    pub etag: Option<String>,
    /// Activity id for support requests.
    pub activity_id: Option<String>,
    /// Query execution metrics, when requested.
    pub query_metrics: Option<QueryMetrics>,
}

impl ResponseEnvelope {
    /// Creates an empty envelope with the given status code.
    #[must_use]
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the request charge.
    #[must_use]
    pub const fn with_request_charge(mut self, charge: f64) -> Self {
        self.request_charge = charge;
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Sets the continuation token.
    #[must_use]
    pub fn with_continuation(mut self, continuation: impl Into<String>) -> Self {
        self.continuation = Some(continuation.into());
        self
    }

    /// Sets the etag.
    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the query metrics.
    #[must_use]
    pub fn with_query_metrics(mut self, metrics: QueryMetrics) -> Self {
        self.query_metrics = Some(metrics);
        self
    }
}

/// A resource returned by a point operation together with its response
/// metadata.
///
/// `ResourceResponse<T>` implements `Deref<Target = T>`, so the resource
/// can be used directly through the wrapper.
#[derive(Debug, Clone)]
pub struct ResourceResponse<T> {
    data: T,
    metadata: ResponseEnvelope,
}

impl<T> ResourceResponse<T> {
    /// Creates a response from data and metadata.
    ///
    /// The metadata's payload is dropped; `data` takes its place.
    #[must_use]
    pub fn new(data: T, mut metadata: ResponseEnvelope) -> Self {
        metadata.payload = None;
        Self { data, metadata }
    }

    /// Consumes the response and returns the inner data.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Returns a reference to the inner data.
    #[must_use]
    pub const fn data(&self) -> &T {
        &self.data
    }

    /// Returns a mutable reference to the inner data.
    #[must_use]
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Returns the response metadata (without payload).
    #[must_use]
    pub const fn metadata(&self) -> &ResponseEnvelope {
        &self.metadata
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.metadata.status_code
    }

    /// Returns the request units consumed.
    #[must_use]
    pub const fn request_charge(&self) -> f64 {
        self.metadata.request_charge
    }

    /// Returns the session token the service returned, if any.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.metadata.session_token.as_deref()
    }

    /// Returns the resource etag, if any.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.metadata.etag.as_deref()
    }

    /// Returns the activity id, if any.
    #[must_use]
    pub fn activity_id(&self) -> Option<&str> {
        self.metadata.activity_id.as_deref()
    }

    /// Maps the inner data, keeping the metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResourceResponse<U> {
        ResourceResponse {
            data: f(self.data),
            metadata: self.metadata,
        }
    }
}

impl ResourceResponse<Value> {
    /// Wraps the payload of an envelope. A missing payload becomes `null`.
    #[must_use]
    pub fn from_envelope(mut envelope: ResponseEnvelope) -> Self {
        let data = envelope.payload.take().unwrap_or(Value::Null);
        Self::new(data, envelope)
    }

    /// Deserializes the payload into a typed resource.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::Serialization`] if the payload does not match `U`.
    pub fn into_typed<U: DeserializeOwned>(self) -> Result<ResourceResponse<U>, CosmosError> {
        let data = serde_json::from_value(self.data)?;
        Ok(ResourceResponse {
            data,
            metadata: self.metadata,
        })
    }

    /// Returns a reference to this resource, preferring its `_self` link.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the payload carries
    /// neither `_self` nor `id`.
    pub fn resource_ref(&self) -> Result<ResourceRef, CosmosError> {
        ResourceRef::from_properties(&self.data)
    }
}

impl<T> Deref for ResourceResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for ResourceResponse<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ResponseEnvelope>();
    assert_send_sync::<ResourceResponse<Value>>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_query_metrics_parse_and_accumulate() {
        let mut total =
            QueryMetrics::parse("totalExecutionTimeInMs=0.5;retrievedDocumentCount=3");
        let other = QueryMetrics::parse("retrievedDocumentCount=4;outputDocumentCount=2");
        total.accumulate(&other);

        assert_eq!(total.get("retrievedDocumentCount"), Some(7.0));
        assert_eq!(total.get("totalExecutionTimeInMs"), Some(0.5));
        assert_eq!(total.get("outputDocumentCount"), Some(2.0));
    }

    #[test]
    fn test_query_metrics_skips_malformed_pairs() {
        let metrics = QueryMetrics::parse("a=1;b;c=x;d=2.5");
        assert_eq!(metrics.iter().count(), 2);
        assert_eq!(metrics.to_string(), "a=1;d=2.5");
    }

    #[test]
    fn test_envelope_builder() {
        let envelope = ResponseEnvelope::new(200)
            .with_continuation("next")
            .with_etag("\"0001\"");
        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.continuation.as_deref(), Some("next"));
        assert_eq!(envelope.etag.as_deref(), Some("\"0001\""));
        assert!(envelope.payload.is_none());
    }

    #[test]
    fn test_response_deref_and_metadata() {
        let response = ResourceResponse::from_envelope(
            ResponseEnvelope::new(200)
                .with_payload(json!({"id": "a", "_self": "dbs/x/colls/y/docs/z/"}))
                .with_request_charge(1.0),
        );

        assert_eq!(response["id"], "a");
        assert_eq!(response.status_code(), 200);
        assert!(response.metadata().payload.is_none());
        assert_eq!(
            response.resource_ref().unwrap(),
            ResourceRef::Materialized("dbs/x/colls/y/docs/z/".to_string())
        );
    }

    #[test]
    fn test_missing_payload_becomes_null() {
        let response = ResourceResponse::from_envelope(ResponseEnvelope::new(204));
        assert!(response.is_null());
    }

    #[test]
    fn test_into_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Order {
            id: String,
            total: u32,
        }

        let response = ResourceResponse::from_envelope(
            ResponseEnvelope::new(200)
                .with_payload(json!({"id": "o-1", "total": 12}))
                .with_request_charge(2.5),
        );
        let typed = response.into_typed::<Order>().unwrap();
        assert_eq!(typed.total, 12);
        assert_eq!(typed.request_charge(), 2.5);

        let bad = ResourceResponse::from_envelope(
            ResponseEnvelope::new(200).with_payload(json!({"id": 1})),
        );
        assert!(matches!(
            bad.into_typed::<Order>(),
            Err(CosmosError::Serialization(_))
        ));
    }
}
