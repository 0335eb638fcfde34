//! REST transport over HTTPS.

use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{AccountEndpoint, AccountKey, CosmosConfig};
use crate::resource::{PartitionKeyRange, ResourceLink, ResourceType, ResponseEnvelope};
use crate::transport::auth::{authorization_token, rfc1123_date};
use crate::transport::headers::{
    self, A_IM, API_VERSION, AUTHORIZATION, CONTINUATION, ETAG, IF_NONE_MATCH, INCREMENTAL_FEED,
    IS_QUERY, IS_UPSERT, PARTITION_KEY, PARTITION_KEY_RANGE_ID, QUERY_CONTENT_TYPE, X_MS_DATE,
    X_MS_VERSION,
};
use crate::transport::{
    FeedKind, FeedRequest, FeedResponse, Operation, PartitionScope, PointRequest, Transport,
    TransportError,
};

/// SDK version from Cargo.toml.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A [`Transport`] speaking the service's REST API.
///
/// Each call is signed with the account's master key. Failures are
/// classified but never retried here.
///
/// # Thread Safety
///
/// `HttpTransport` is `Send + Sync` and is shared by every handle of a
/// client.
///
/// # Example
///
/// ```rust
/// use cosmosdb::transport::HttpTransport;
/// use cosmosdb::CosmosConfig;
///
/// let config = CosmosConfig::from_connection_string(
///     "AccountEndpoint=https://myaccount.documents.azure.com:443/;AccountKey=c2VjcmV0;",
/// )
/// .unwrap();
/// let transport = HttpTransport::new(&config).unwrap();
/// assert!(transport.user_agent().starts_with("cosmosdb-client-rust/"));
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: AccountEndpoint,
    key: AccountKey,
    user_agent: String,
}

// Verify HttpTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpTransport>();
};

/// One HTTP exchange, before signing.
struct Call {
    method: Method,
    path: String,
    resource_type: ResourceType,
    auth_link: String,
    headers: Vec<(String, String)>,
    body: Option<(String, &'static str)>,
}

impl HttpTransport {
    /// Creates a transport for the configured account.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the HTTP client cannot be created.
    pub fn new(config: &CosmosConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let user_agent = config.user_agent_suffix().map_or_else(
            || format!("cosmosdb-client-rust/{SDK_VERSION}"),
            |suffix| format!("cosmosdb-client-rust/{SDK_VERSION} {suffix}"),
        );

        Ok(Self {
            client,
            endpoint: config.endpoint().clone(),
            key: config.key().clone(),
            user_agent,
        })
    }

    /// Returns the account endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &AccountEndpoint {
        &self.endpoint
    }

    /// Returns the `User-Agent` sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn send(&self, call: Call) -> Result<(u16, HeaderMap, Option<Value>), TransportError> {
        let url = self.endpoint.join(&call.path);
        let date = rfc1123_date(Utc::now());
        let authorization = authorization_token(
            &self.key,
            call.method.as_str(),
            call.resource_type.path_segment(),
            &call.auth_link,
            &date,
        )?;

        let mut request = self
            .client
            .request(call.method.clone(), &url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
            .header(X_MS_VERSION, API_VERSION)
            .header(X_MS_DATE, &date)
            .header(AUTHORIZATION, authorization);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some((body, content_type)) = call.body {
            request = request.header("Content-Type", content_type).body(body);
        }

        debug!(method = %call.method, path = %call.path, "Sending request");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) if response_is_ok(status) => return Err(e.into()),
            Err(_) => String::new(),
        };

        if response_is_ok(status) {
            let body = parse_body(status, &text)?;
            return Ok((status, response_headers, body));
        }

        // Error bodies are best effort: the status decides the outcome.
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| text.clone(), str::to_string);
        let mut error = TransportError::new(status, message);
        if let Some(sub_status) = headers::sub_status(&response_headers) {
            error = error.with_sub_status(sub_status);
        }
        if let Some(activity_id) = headers::activity_id(&response_headers) {
            error = error.with_activity_id(activity_id);
        }
        if let Some(retry_after) = headers::retry_after(&response_headers) {
            error = error.with_retry_after(retry_after);
        }
        if status == 429 {
            warn!(
                path = %call.path,
                retry_after_ms = error
                    .retry_after
                    .and_then(|d| u64::try_from(d.as_millis()).ok()),
                "Request throttled by the service"
            );
        }
        Err(error)
    }
}

/// Parses a successful response body. Empty bodies are absent; anything
/// else must be JSON.
fn parse_body(status: u16, text: &str) -> Result<Option<Value>, TransportError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| TransportError::new(status, format!("Malformed response body: {e}")))
}

const fn response_is_ok(status: u16) -> bool {
    // 304 is an empty change feed page.
    matches!(status, 200..=299 | 304)
}

fn auth_link(link: &ResourceLink) -> String {
    link.as_str().trim_matches('/').to_string()
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: PointRequest) -> Result<ResponseEnvelope, TransportError> {
        let mut extra = headers::option_headers(&request.options);
        let (method, path, link) = match request.operation {
            Operation::Create | Operation::Upsert => {
                if request.operation == Operation::Upsert {
                    extra.push((IS_UPSERT.to_string(), "True".to_string()));
                }
                (
                    Method::POST,
                    request.parent.feed(request.resource_type),
                    auth_link(&request.parent),
                )
            }
            Operation::Read => (Method::GET, request.link.to_string(), auth_link(&request.link)),
            Operation::Replace => (Method::PUT, request.link.to_string(), auth_link(&request.link)),
            Operation::Delete => (
                Method::DELETE,
                request.link.to_string(),
                auth_link(&request.link),
            ),
        };
        let body = request
            .payload
            .as_ref()
            .map(|payload| (payload.to_string(), "application/json"));

        let (status, response_headers, payload) = self
            .send(Call {
                method,
                path,
                resource_type: request.resource_type,
                auth_link: link,
                headers: extra,
                body,
            })
            .await?;
        let mut envelope = headers::envelope_from_headers(status, &response_headers, CONTINUATION);
        envelope.payload = payload;
        Ok(envelope)
    }

    async fn query_page(&self, request: FeedRequest) -> Result<FeedResponse, TransportError> {
        let mut extra = headers::option_headers(&request.options);
        match &request.scope {
            PartitionScope::Range(range) => {
                extra.push((PARTITION_KEY_RANGE_ID.to_string(), range.id.clone()));
            }
            PartitionScope::Key(key) if request.options.options().partition_key.is_none() => {
                extra.push((PARTITION_KEY.to_string(), key.to_header_value()));
            }
            PartitionScope::Key(_) | PartitionScope::Unpartitioned => {}
        }

        let (method, body, continuation_header) = match &request.kind {
            FeedKind::Query(query) => {
                extra.push((IS_QUERY.to_string(), "True".to_string()));
                if let Some(token) = &request.continuation {
                    extra.push((CONTINUATION.to_string(), token.clone()));
                }
                (
                    Method::POST,
                    Some((query.to_body().to_string(), QUERY_CONTENT_TYPE)),
                    CONTINUATION,
                )
            }
            FeedKind::ChangeFeed {
                start_from_beginning,
            } => {
                extra.push((A_IM.to_string(), INCREMENTAL_FEED.to_string()));
                match &request.continuation {
                    Some(etag) => extra.push((IF_NONE_MATCH.to_string(), etag.clone())),
                    None if !start_from_beginning => {
                        extra.push((IF_NONE_MATCH.to_string(), "*".to_string()));
                    }
                    None => {}
                }
                (Method::GET, None, ETAG)
            }
        };

        let (status, response_headers, payload) = self
            .send(Call {
                method,
                path: request.link.feed(request.resource_type),
                resource_type: request.resource_type,
                auth_link: auth_link(&request.link),
                headers: extra,
                body,
            })
            .await?;

        let items = payload
            .as_ref()
            .and_then(|p| p.get(request.resource_type.feed_key()))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let envelope =
            headers::envelope_from_headers(status, &response_headers, continuation_header);
        Ok(FeedResponse { items, envelope })
    }

    async fn partition_ranges(
        &self,
        container: &ResourceLink,
    ) -> Result<Vec<PartitionKeyRange>, TransportError> {
        let mut ranges = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let request_headers = continuation
                .take()
                .map(|token| vec![(CONTINUATION.to_string(), token)])
                .unwrap_or_default();
            let (status, response_headers, payload) = self
                .send(Call {
                    method: Method::GET,
                    path: container.feed(ResourceType::PartitionKeyRange),
                    resource_type: ResourceType::PartitionKeyRange,
                    auth_link: auth_link(container),
                    headers: request_headers,
                    body: None,
                })
                .await?;

            let page: Vec<PartitionKeyRange> = payload
                .as_ref()
                .and_then(|p| p.get(ResourceType::PartitionKeyRange.feed_key()))
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| TransportError::new(status, format!("Malformed range map: {e}")))?
                .unwrap_or_default();
            ranges.extend(page);

            let envelope = headers::envelope_from_headers(status, &response_headers, CONTINUATION);
            match envelope.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        ranges.sort_by(|a, b| a.min_inclusive.cmp(&b.min_inclusive));
        debug!(container = %container, ranges = ranges.len(), "Read partition map");
        Ok(ranges)
    }
}
