//! Transport doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use cosmosdb::resource::{PartitionKeyRange, ResourceLink, ResourceType, ResponseEnvelope};
use cosmosdb::transport::{
    FeedKind, FeedRequest, FeedResponse, Operation, PartitionScope, PointRequest, Transport,
    TransportError,
};
use cosmosdb::{AccessCondition, AccountEndpoint, AccountKey, CosmosConfig};

/// A configuration pointing nowhere; the doubles never touch the network.
pub fn test_config() -> CosmosConfig {
    CosmosConfig::builder()
        .endpoint(AccountEndpoint::new("https://test.documents.azure.com:443").unwrap())
        .key(AccountKey::new("dGVzdC1rZXk=").unwrap())
        .build()
        .unwrap()
}

/// Builds one page of a feed.
pub fn page(items: Vec<Value>, request_charge: f64, continuation: Option<&str>) -> FeedResponse {
    let mut envelope = ResponseEnvelope::new(200).with_request_charge(request_charge);
    if let Some(token) = continuation {
        envelope = envelope.with_continuation(token);
    }
    FeedResponse { items, envelope }
}

/// Items `{"id": "<n>", "key": n}` for each key.
pub fn keyed(keys: &[i64]) -> Vec<Value> {
    keys.iter()
        .map(|k| json!({"id": k.to_string(), "key": k}))
        .collect()
}

/// Returns the label the scripted transport files a request under.
pub fn scope_label(scope: &PartitionScope) -> String {
    match scope {
        PartitionScope::Range(range) => range.id.clone(),
        PartitionScope::Key(key) => format!("key:{key}"),
        PartitionScope::Unpartitioned => "*".to_string(),
    }
}

/// Pops the next scripted entry, repeating the last one forever.
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// A feed transport that replays scripted pages and counts every call.
///
/// Pages are filed under `(partition label, continuation)`. The last
/// scripted response of a slot (and of the partition map) repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    ranges: Mutex<VecDeque<Result<Vec<PartitionKeyRange>, TransportError>>>,
    pages: Mutex<HashMap<(String, Option<String>), VecDeque<Result<FeedResponse, TransportError>>>>,
    requests: Mutex<Vec<FeedRequest>>,
    page_calls: AtomicUsize,
    range_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(ranges: Vec<PartitionKeyRange>) -> Self {
        let transport = Self::default();
        transport.ranges.lock().push_back(Ok(ranges));
        transport
    }

    /// Queues a partition map read result.
    pub fn script_ranges(&self, result: Result<Vec<PartitionKeyRange>, TransportError>) {
        self.ranges.lock().push_back(result);
    }

    /// Queues a page for `partition` requested with `continuation`.
    pub fn script_page(
        &self,
        partition: &str,
        continuation: Option<&str>,
        result: Result<FeedResponse, TransportError>,
    ) {
        self.pages
            .lock()
            .entry((partition.to_string(), continuation.map(str::to_string)))
            .or_default()
            .push_back(result);
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.page_calls() + self.range_calls()
    }

    pub fn requests(&self) -> Vec<FeedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: PointRequest) -> Result<ResponseEnvelope, TransportError> {
        Err(TransportError::new(
            501,
            format!("point operation {} not scripted", request.operation),
        ))
    }

    async fn query_page(&self, request: FeedRequest) -> Result<FeedResponse, TransportError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let slot = (scope_label(&request.scope), request.continuation.clone());
        self.requests.lock().push(request);
        let scripted = self
            .pages
            .lock()
            .get_mut(&slot)
            .and_then(|queue| next_scripted(queue));
        scripted.unwrap_or_else(|| {
            Err(TransportError::new(
                400,
                format!("no page scripted for {slot:?}"),
            ))
        })
    }

    async fn partition_ranges(
        &self,
        _container: &ResourceLink,
    ) -> Result<Vec<PartitionKeyRange>, TransportError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        next_scripted(&mut self.ranges.lock()).unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// A feed transport that holds every page request open for a moment and
/// records how many were outstanding at once.
///
/// Each range returns one page holding a single item keyed by its id.
pub struct InFlightTransport {
    ranges: Vec<PartitionKeyRange>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    page_calls: AtomicUsize,
}

impl InFlightTransport {
    pub fn new(ranges: Vec<PartitionKeyRange>) -> Self {
        Self {
            ranges,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for InFlightTransport {
    async fn execute(&self, request: PointRequest) -> Result<ResponseEnvelope, TransportError> {
        Err(TransportError::new(
            501,
            format!("point operation {} not scripted", request.operation),
        ))
    }

    async fn query_page(&self, request: FeedRequest) -> Result<FeedResponse, TransportError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key: i64 = scope_label(&request.scope).parse().unwrap_or(-1);
        Ok(page(keyed(&[key]), 1.0, None))
    }

    async fn partition_ranges(
        &self,
        _container: &ResourceLink,
    ) -> Result<Vec<PartitionKeyRange>, TransportError> {
        Ok(self.ranges.clone())
    }
}

/// An in-memory service keyed by resource link.
///
/// Writes bump a global LSN returned as the session token `0:1#<lsn>`.
/// An `If-Match` condition is checked against the stored `_etag`.
/// Feeds return every stored child of the requested type in one page.
#[derive(Default)]
pub struct MemoryStore {
    resources: Mutex<HashMap<String, Value>>,
    lsn: AtomicUsize,
    points: Mutex<Vec<PointRequest>>,
    feeds: Mutex<Vec<FeedRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource directly.
    pub fn seed(&self, link: &str, body: Value) {
        self.resources.lock().insert(link.to_string(), body);
    }

    pub fn get(&self, link: &str) -> Option<Value> {
        self.resources.lock().get(link).cloned()
    }

    pub fn point_requests(&self) -> Vec<PointRequest> {
        self.points.lock().clone()
    }

    pub fn feed_requests(&self) -> Vec<FeedRequest> {
        self.feeds.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.points.lock().len() + self.feeds.lock().len()
    }

    fn session_token(&self, advance: bool) -> String {
        let lsn = if advance {
            self.lsn.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.lsn.load(Ordering::SeqCst)
        };
        format!("0:1#{lsn}")
    }
}

#[async_trait]
impl Transport for MemoryStore {
    async fn execute(&self, request: PointRequest) -> Result<ResponseEnvelope, TransportError> {
        self.points.lock().push(request.clone());
        let link = request.link.to_string();
        let mut resources = self.resources.lock();
        if let Some(AccessCondition::IfMatch(etag)) = &request.options.options().access_condition {
            let current = resources.get(&link).and_then(|body| body.get("_etag"));
            if current.and_then(Value::as_str) != Some(etag.as_str()) {
                return Err(TransportError::new(
                    412,
                    "Operation cannot be performed because one of the specified precondition is not met.",
                ));
            }
        }

        let body = match request.operation {
            Operation::Create => {
                if resources.contains_key(&link) {
                    return Err(TransportError::new(
                        409,
                        "Entity with the specified id already exists in the system.",
                    ));
                }
                let body = request.payload.unwrap_or(Value::Null);
                resources.insert(link, body.clone());
                body
            }
            Operation::Upsert => {
                let body = request.payload.unwrap_or(Value::Null);
                resources.insert(link, body.clone());
                body
            }
            Operation::Replace => {
                if !resources.contains_key(&link) {
                    return Err(TransportError::new(404, "Entity could not be found."));
                }
                let body = request.payload.unwrap_or(Value::Null);
                resources.insert(link, body.clone());
                body
            }
            Operation::Read => resources
                .get(&link)
                .cloned()
                .ok_or_else(|| TransportError::new(404, "Entity could not be found."))?,
            Operation::Delete => {
                resources
                    .remove(&link)
                    .ok_or_else(|| TransportError::new(404, "Entity could not be found."))?;
                Value::Null
            }
        };
        drop(resources);

        let advance = request.operation != Operation::Read;
        let status = match request.operation {
            Operation::Create => 201,
            Operation::Delete => 204,
            _ => 200,
        };
        let mut envelope = ResponseEnvelope::new(status)
            .with_request_charge(1.0)
            .with_session_token(self.session_token(advance));
        if !body.is_null() {
            envelope = envelope.with_payload(body);
        }
        Ok(envelope)
    }

    async fn query_page(&self, request: FeedRequest) -> Result<FeedResponse, TransportError> {
        self.feeds.lock().push(request.clone());
        if matches!(request.kind, FeedKind::ChangeFeed { .. }) && request.continuation.is_some() {
            return Ok(FeedResponse::default());
        }
        let prefix = format!("{}/", request.link.feed(request.resource_type));
        let mut items: Vec<(String, Value)> = self
            .resources
            .lock()
            .iter()
            .filter(|(link, _)| {
                link.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('/'))
            })
            .map(|(link, body)| (link.clone(), body.clone()))
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));

        let mut envelope = ResponseEnvelope::new(200)
            .with_request_charge(2.5)
            .with_session_token(self.session_token(false));
        if matches!(request.kind, FeedKind::ChangeFeed { .. }) {
            envelope = envelope.with_continuation("\"1\"");
        }
        Ok(FeedResponse {
            items: items.into_iter().map(|(_, body)| body).collect(),
            envelope,
        })
    }

    async fn partition_ranges(
        &self,
        _container: &ResourceLink,
    ) -> Result<Vec<PartitionKeyRange>, TransportError> {
        Ok(vec![PartitionKeyRange::new(
            "0",
            "",
            PartitionKeyRange::MAX_EXCLUSIVE,
        )])
    }
}

/// Link helpers for the fixtures.
pub fn container_link(database: &str, container: &str) -> ResourceLink {
    ResourceLink::root()
        .child(ResourceType::Database, database)
        .unwrap()
        .child(ResourceType::Container, container)
        .unwrap()
}
