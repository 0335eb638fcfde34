//! Header names and the mapping of options and responses onto headers.

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::request::OptionSet;
use crate::resource::{QueryMetrics, ResponseEnvelope};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2018-12-31";

pub(crate) const AUTHORIZATION: &str = "authorization";
pub(crate) const X_MS_DATE: &str = "x-ms-date";
pub(crate) const X_MS_VERSION: &str = "x-ms-version";
pub(crate) const REQUEST_CHARGE: &str = "x-ms-request-charge";
pub(crate) const SESSION_TOKEN: &str = "x-ms-session-token";
pub(crate) const CONTINUATION: &str = "x-ms-continuation";
pub(crate) const QUERY_METRICS: &str = "x-ms-documentdb-query-metrics";
pub(crate) const ACTIVITY_ID: &str = "x-ms-activity-id";
pub(crate) const SUB_STATUS: &str = "x-ms-substatus";
pub(crate) const RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";
pub(crate) const RETRY_AFTER: &str = "retry-after";
pub(crate) const ETAG: &str = "etag";
pub(crate) const PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
pub(crate) const PARTITION_KEY_RANGE_ID: &str = "x-ms-documentdb-partitionkeyrangeid";
pub(crate) const ENABLE_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
pub(crate) const MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
pub(crate) const IS_QUERY: &str = "x-ms-documentdb-isquery";
pub(crate) const IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
pub(crate) const CONSISTENCY_LEVEL: &str = "x-ms-consistency-level";
pub(crate) const POPULATE_QUERY_METRICS: &str = "x-ms-documentdb-populatequerymetrics";
pub(crate) const OFFER_THROUGHPUT: &str = "x-ms-offer-throughput";
pub(crate) const DISABLE_RU_PER_MINUTE: &str = "x-ms-documentdb-disable-ru-per-minute-usage";
pub(crate) const A_IM: &str = "A-IM";
pub(crate) const INCREMENTAL_FEED: &str = "Incremental feed";
pub(crate) const IF_NONE_MATCH: &str = "If-None-Match";
pub(crate) const QUERY_CONTENT_TYPE: &str = "application/query+json";

/// Maps composed options onto request headers.
///
/// Pass-through headers come first so typed options win on conflict. The
/// continuation and parallelism options are not headers: the executor
/// handles them per partition.
pub(crate) fn option_headers(options: &OptionSet) -> Vec<(String, String)> {
    let options = options.options();
    let mut headers: Vec<(String, String)> = options
        .initial_headers
        .iter()
        .flatten()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let mut push = |name: &str, value: String| headers.push((name.to_string(), value));

    if let Some(key) = &options.partition_key {
        push(PARTITION_KEY, key.to_header_value());
    }
    if let Some(token) = &options.session_token {
        push(SESSION_TOKEN, token.clone());
    }
    if let Some(level) = options.consistency_level {
        push(CONSISTENCY_LEVEL, level.as_str().to_string());
    }
    if let Some(disable) = options.disable_ru_per_minute_usage {
        push(DISABLE_RU_PER_MINUTE, disable.to_string());
    }
    if let Some(enabled) = options.enable_cross_partition_query {
        push(ENABLE_CROSS_PARTITION, enabled.to_string());
    }
    if let Some(count) = options.max_item_count {
        push(MAX_ITEM_COUNT, count.to_string());
    }
    if let Some(condition) = &options.access_condition {
        push(condition.header_name(), condition.etag().to_string());
    }
    if let Some(populate) = options.populate_query_metrics {
        push(POPULATE_QUERY_METRICS, populate.to_string());
    }
    if let Some(throughput) = options.offer_throughput {
        push(OFFER_THROUGHPUT, throughput.to_string());
    }
    headers
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Reads response metadata from headers.
///
/// `continuation_header` is `x-ms-continuation` for queries and `etag` for
/// the change feed.
pub(crate) fn envelope_from_headers(
    status_code: u16,
    headers: &HeaderMap,
    continuation_header: &str,
) -> ResponseEnvelope {
    ResponseEnvelope {
        status_code,
        payload: None,
        request_charge: header(headers, REQUEST_CHARGE)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default(),
        session_token: header(headers, SESSION_TOKEN).map(str::to_string),
        continuation: header(headers, continuation_header).map(str::to_string),
        etag: header(headers, ETAG).map(str::to_string),
        activity_id: header(headers, ACTIVITY_ID).map(str::to_string),
        query_metrics: header(headers, QUERY_METRICS).map(QueryMetrics::parse),
    }
}

/// Reads the sub-status of a failed response.
pub(crate) fn sub_status(headers: &HeaderMap) -> Option<u32> {
    header(headers, SUB_STATUS).and_then(|value| value.parse().ok())
}

/// Reads the wait a throttled response asks for.
///
/// `x-ms-retry-after-ms` wins over a standard `Retry-After` in seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(millis) = header(headers, RETRY_AFTER_MS).and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_millis(millis));
    }
    header(headers, RETRY_AFTER)
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Reads the activity id of a response.
pub(crate) fn activity_id(headers: &HeaderMap) -> Option<String> {
    header(headers, ACTIVITY_ID).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsistencyLevel;
    use crate::request::{compose, AccessCondition, OperationScope, OptionDefaults, RequestOptions};
    use reqwest::header::HeaderValue;

    fn lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_unset_options_produce_no_headers() {
        let set = compose(
            &RequestOptions::new(),
            &OptionDefaults::default(),
            OperationScope::Query,
        )
        .unwrap();
        assert!(option_headers(&set).is_empty());
    }

    #[test]
    fn test_option_headers() {
        let explicit = RequestOptions::new()
            .with_partition_key("tenant-1")
            .with_consistency_level(ConsistencyLevel::Eventual)
            .with_access_condition(AccessCondition::IfMatch("\"e1\"".to_string()))
            .with_header("x-custom", "1");
        let set = compose(&explicit, &OptionDefaults::default(), OperationScope::ItemRead).unwrap();
        let headers = option_headers(&set);

        assert_eq!(lookup(&headers, PARTITION_KEY), Some(r#"["tenant-1"]"#));
        assert_eq!(lookup(&headers, CONSISTENCY_LEVEL), Some("Eventual"));
        assert_eq!(lookup(&headers, "If-Match"), Some("\"e1\""));
        assert_eq!(lookup(&headers, "x-custom"), Some("1"));
        assert_eq!(lookup(&headers, SESSION_TOKEN), None);
    }

    #[test]
    fn test_envelope_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_CHARGE, HeaderValue::from_static("2.86"));
        headers.insert(SESSION_TOKEN, HeaderValue::from_static("0:1#7"));
        headers.insert(CONTINUATION, HeaderValue::from_static("+RID:x"));
        headers.insert(ETAG, HeaderValue::from_static("\"42\""));
        headers.insert(QUERY_METRICS, HeaderValue::from_static("retrievedDocumentCount=3"));

        let query = envelope_from_headers(200, &headers, CONTINUATION);
        assert_eq!(query.request_charge, 2.86);
        assert_eq!(query.session_token.as_deref(), Some("0:1#7"));
        assert_eq!(query.continuation.as_deref(), Some("+RID:x"));
        assert_eq!(
            query.query_metrics.unwrap().get("retrievedDocumentCount"),
            Some(3.0)
        );

        let change_feed = envelope_from_headers(200, &headers, ETAG);
        assert_eq!(change_feed.continuation.as_deref(), Some("\"42\""));
    }

    #[test]
    fn test_missing_headers_are_absent() {
        let envelope = envelope_from_headers(204, &HeaderMap::new(), CONTINUATION);
        assert_eq!(envelope.request_charge, 0.0);
        assert!(envelope.session_token.is_none());
        assert!(envelope.continuation.is_none());
        assert!(sub_status(&HeaderMap::new()).is_none());
        assert!(retry_after(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_retry_after_prefers_milliseconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert(RETRY_AFTER_MS, HeaderValue::from_static("150"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(150)));

        let mut garbled = HeaderMap::new();
        garbled.insert(RETRY_AFTER_MS, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&garbled), None);
    }
}
