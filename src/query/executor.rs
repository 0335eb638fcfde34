//! Cross-partition query execution.
//!
//! A [`QueryExecutor`] drives one logical query (or listing, or change feed
//! read) over the partitions it targets:
//!
//! 1. **Planning** decides the partition set. An explicit partition key
//!    means one logical partition; an unpartitioned feed means one call
//!    stream; otherwise the container's partition key ranges are read from
//!    the transport, which requires cross-partition execution to be
//!    enabled for queries.
//! 2. **Fetching** issues page requests for partitions whose buffer ran
//!    dry, at most `parallelism` at a time. Results are applied one at a
//!    time as they complete, so each partition buffer has a single writer.
//! 3. **Draining** yields buffered items. Ordered queries yield the
//!    smallest head across partitions (a k-way merge); unordered queries
//!    drain partitions in plan order.
//!
//! A partition that reports a split (`410` with a split sub-status) is
//! replaced by its children, which inherit its continuation but not a
//! pending skip count, so a split mid-page may repeat items but never loses
//! them. Retryable page failures are re-issued a bounded number of times
//! after a wait; anything else fails the query with
//! [`CosmosError::QueryFailed`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{
    CosmosConfig, DEFAULT_PAGE_RETRY_LIMIT, DEFAULT_PAGE_RETRY_WAIT,
    DEFAULT_PARTITION_MAP_REFRESH_LIMIT,
};
use crate::error::CosmosError;
use crate::query::continuation::{CompositeContinuation, RangeContinuation};
use crate::query::order::SortKey;
use crate::query::OrderBy;
use crate::request::OptionSet;
use crate::resource::{PartitionKeyRange, QueryMetrics, ResourceLink, ResourceType};
use crate::session::SessionTracker;
use crate::transport::{
    FeedKind, FeedRequest, FeedResponse, PartitionScope, Transport, TransportError,
};

/// Upper bound on concurrent page fetches when the caller lets the
/// executor choose.
pub const MAX_AUTO_PARALLELISM: usize = 16;

/// Page size of [`QueryExecutor::next_page`] when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Lifecycle of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryPhase {
    /// The partition set is not known yet.
    Planning,
    /// Page requests are in flight.
    Fetching,
    /// Buffered items are being handed out.
    Draining,
    /// Every partition delivered its last page.
    Exhausted,
    /// A failure ended the query.
    Failed,
    /// The caller abandoned the query.
    Cancelled,
}

impl QueryPhase {
    /// Returns `true` for states no further call leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Failed | Self::Cancelled)
    }
}

/// Response metadata accumulated over the whole query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryMetadata {
    /// Sum of the request charge of every page fetched.
    pub request_charge: f64,
    /// Number of pages fetched.
    pub page_count: u32,
    /// Query metrics summed over every page.
    pub query_metrics: QueryMetrics,
    /// Query metrics per partition.
    pub partition_metrics: BTreeMap<String, QueryMetrics>,
    /// Latest session token returned.
    pub session_token: Option<String>,
    /// Activity ids of every page, in fetch order.
    pub activity_ids: Vec<String>,
}

/// A page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    /// Items of the page.
    pub items: Vec<Value>,
    /// Request charge of the fetches made while filling this page.
    pub request_charge: f64,
    /// Resumes the query after this page; absent once a query is
    /// exhausted. A change feed always carries one.
    pub continuation: Option<String>,
}

/// Limits an executor runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Parallel page fetches; zero or negative lets the executor choose.
    pub max_degree_of_parallelism: i32,
    /// Items per [`FeedPage`].
    pub page_size: usize,
    /// Partition map re-reads allowed before a split fails the query.
    pub partition_map_refresh_limit: u32,
    /// Re-issues of one partition's page after retryable failures.
    pub page_retry_limit: u32,
    /// Wait before a re-issue when the failure carries no retry-after.
    pub page_retry_wait: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_degree_of_parallelism: 0,
            page_size: DEFAULT_PAGE_SIZE,
            partition_map_refresh_limit: DEFAULT_PARTITION_MAP_REFRESH_LIMIT,
            page_retry_limit: DEFAULT_PAGE_RETRY_LIMIT,
            page_retry_wait: DEFAULT_PAGE_RETRY_WAIT,
        }
    }
}

impl ExecutorSettings {
    /// Derives settings from client configuration and the composed options
    /// of the call.
    #[must_use]
    pub fn new(config: &CosmosConfig, options: &OptionSet) -> Self {
        let options = options.options();
        Self {
            max_degree_of_parallelism: options
                .max_degree_of_parallelism
                .unwrap_or_else(|| config.max_degree_of_parallelism()),
            page_size: options
                .max_item_count
                .or_else(|| config.max_item_count())
                .map_or(DEFAULT_PAGE_SIZE, |n| (n as usize).max(1)),
            partition_map_refresh_limit: config.partition_map_refresh_limit(),
            page_retry_limit: config.page_retry_limit(),
            page_retry_wait: config.page_retry_wait(),
        }
    }

    /// Returns the number of concurrent fetches for `partitions` targets.
    #[must_use]
    pub fn parallelism(&self, partitions: usize) -> usize {
        match usize::try_from(self.max_degree_of_parallelism) {
            Ok(requested) if requested > 0 => requested,
            _ => partitions.clamp(1, MAX_AUTO_PARALLELISM),
        }
    }
}

/// What an executor reads.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedTarget {
    /// Link of the parent whose feed is read.
    pub link: ResourceLink,
    /// Type of the listed resources.
    pub resource_type: ResourceType,
    /// Query or change feed.
    pub kind: FeedKind,
}

#[derive(Debug)]
struct Buffered {
    key: SortKey,
    value: Value,
    seq: u64,
}

/// Per-partition state.
#[derive(Debug)]
struct Cursor {
    id: u64,
    scope: PartitionScope,
    /// Continuation that produced the current buffer.
    page_token: Option<String>,
    /// Continuation of the next page.
    next_token: Option<String>,
    /// Items of the current page already handed out.
    consumed: usize,
    /// Items to drop from the next page (set when resuming).
    skip: usize,
    buffer: VecDeque<Buffered>,
    done: bool,
    seq: u64,
    retries: u32,
}

impl Cursor {
    fn new(id: u64, scope: PartitionScope, token: Option<String>, skip: usize) -> Self {
        Self {
            id,
            scope,
            page_token: None,
            next_token: token,
            consumed: 0,
            skip,
            buffer: VecDeque::new(),
            done: false,
            seq: 0,
            retries: 0,
        }
    }

    fn needs_fetch(&self) -> bool {
        !self.done && self.buffer.is_empty()
    }

    fn is_live(&self) -> bool {
        !self.done || !self.buffer.is_empty()
    }

    fn label(&self) -> String {
        match &self.scope {
            PartitionScope::Range(range) => range.id.clone(),
            PartitionScope::Key(key) => key.to_string(),
            PartitionScope::Unpartitioned => String::new(),
        }
    }

    fn resume_point(&self) -> RangeContinuation {
        let (id, min, max) = match &self.scope {
            PartitionScope::Range(range) => (
                range.id.clone(),
                range.min_inclusive.clone(),
                range.max_exclusive.clone(),
            ),
            PartitionScope::Key(_) | PartitionScope::Unpartitioned => {
                (String::new(), String::new(), String::new())
            }
        };
        let (token, skip) = if self.buffer.is_empty() {
            (self.next_token.clone(), self.skip)
        } else {
            (self.page_token.clone(), self.consumed)
        };
        RangeContinuation {
            id,
            min,
            max,
            token,
            skip,
        }
    }
}

/// Drives one query across the partitions it targets.
///
/// Obtained from the query and listing calls of the client facade, which
/// start it eagerly so the first page's metadata is available at once.
/// Iterate with [`next_item`](Self::next_item),
/// [`next_page`](Self::next_page) or [`into_stream`](Self::into_stream).
/// Dropping the executor or calling [`cancel`](Self::cancel) stops it; no
/// transport call is issued afterwards.
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
    target: FeedTarget,
    options: OptionSet,
    settings: ExecutorSettings,
    order: Vec<OrderBy>,
    resume: Option<CompositeContinuation>,
    session: Option<Arc<SessionTracker>>,
    phase: QueryPhase,
    planned: bool,
    cursors: Vec<Cursor>,
    next_cursor_id: u64,
    refreshes: u32,
    metadata: QueryMetadata,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("target", &self.target)
            .field("phase", &self.phase)
            .field("partitions", &self.cursors.len())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

// Verify QueryExecutor is Send at compile time so it can move across tasks
const _: fn() = || {
    const fn assert_send<T: Send>() {}
    assert_send::<QueryExecutor>();
};

impl QueryExecutor {
    /// Creates an executor. No transport call is made until the first
    /// item or page is requested.
    ///
    /// A `continuation` in `options` resumes a query from a token returned
    /// by [`FeedPage::continuation`] or [`continuation`](Self::continuation).
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidOption`] if the continuation was not
    /// issued by an executor.
    pub fn new(
        transport: Arc<dyn Transport>,
        target: FeedTarget,
        options: OptionSet,
        settings: ExecutorSettings,
    ) -> Result<Self, CosmosError> {
        let resume = options
            .options()
            .continuation
            .as_deref()
            .map(CompositeContinuation::decode)
            .transpose()?;
        let order = match &target.kind {
            FeedKind::Query(query) => query.order_by_keys(),
            FeedKind::ChangeFeed { .. } => Vec::new(),
        };
        Ok(Self {
            transport,
            target,
            options: options.with_continuation(None),
            settings,
            order,
            resume,
            session: None,
            phase: QueryPhase::Planning,
            planned: false,
            cursors: Vec::new(),
            next_cursor_id: 0,
            refreshes: 0,
            metadata: QueryMetadata::default(),
        })
    }

    /// Records every page's session token in `tracker` under the target
    /// link.
    #[must_use]
    pub fn with_session_tracker(mut self, tracker: Arc<SessionTracker>) -> Self {
        self.session = Some(tracker);
        self
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> QueryPhase {
        self.phase
    }

    /// Returns `true` if results are merged by a sort key.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        !self.order.is_empty()
    }

    /// Returns the metadata accumulated so far.
    #[must_use]
    pub const fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    /// Returns the total request charge so far.
    #[must_use]
    pub const fn request_charge(&self) -> f64 {
        self.metadata.request_charge
    }

    /// Returns the complete metadata once the query is exhausted.
    #[must_use]
    pub fn final_metadata(&self) -> Option<&QueryMetadata> {
        (self.phase == QueryPhase::Exhausted).then_some(&self.metadata)
    }

    /// Returns the number of partitions in the current plan.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.cursors.len()
    }

    /// Returns a token that resumes the query at the next undelivered item.
    ///
    /// Absent once a query reached a terminal phase. A change feed that
    /// caught up keeps a token carrying every range's latest etag, so a
    /// later read picks up only newer changes.
    #[must_use]
    pub fn continuation(&self) -> Option<String> {
        let change_feed = matches!(self.target.kind, FeedKind::ChangeFeed { .. });
        match self.phase {
            QueryPhase::Failed | QueryPhase::Cancelled => return None,
            QueryPhase::Exhausted if !change_feed => return None,
            _ => {}
        }
        if !self.planned {
            return self.resume.as_ref().map(CompositeContinuation::encode);
        }
        let ranges: Vec<_> = self
            .cursors
            .iter()
            .filter(|c| change_feed || c.is_live())
            .map(Cursor::resume_point)
            .collect();
        if ranges.is_empty() {
            return None;
        }
        Some(CompositeContinuation { ranges }.encode())
    }

    /// Abandons the query, releasing buffered results.
    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            debug!(link = %self.target.link, "Query cancelled");
            self.phase = QueryPhase::Cancelled;
        }
        self.cursors.clear();
    }

    /// Plans the query and fetches the first pages.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::CrossPartitionRequired`] for a query without
    /// a partition key that did not enable cross-partition execution, or
    /// the first fetch failure.
    pub async fn prime(&mut self) -> Result<(), CosmosError> {
        if self.phase.is_terminal() {
            return Ok(());
        }
        if !self.planned {
            self.plan().await?;
        }
        let window = self.fetch_window();
        self.fetch(window).await
    }

    /// Returns the next item, or `None` once the query is exhausted.
    ///
    /// After a failure or cancellation every call returns `None`.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the query.
    pub async fn next_item(&mut self) -> Result<Option<Value>, CosmosError> {
        loop {
            if self.phase.is_terminal() {
                return Ok(None);
            }
            if !self.planned {
                self.plan().await?;
            }

            let ready = if self.is_ordered() {
                // Every live partition needs a head before the smallest can
                // be chosen.
                let pending: Vec<u64> = self
                    .cursors
                    .iter()
                    .filter(|c| c.needs_fetch())
                    .map(|c| c.id)
                    .collect();
                if !pending.is_empty() {
                    self.fetch(pending).await?;
                    continue;
                }
                self.smallest_head()
            } else {
                match self.cursors.iter().position(Cursor::is_live) {
                    Some(index) if self.cursors[index].needs_fetch() => {
                        let window = self.fetch_window();
                        self.fetch(window).await?;
                        continue;
                    }
                    other => other,
                }
            };

            let Some(index) = ready else {
                self.phase = QueryPhase::Exhausted;
                debug!(
                    link = %self.target.link,
                    request_charge = self.metadata.request_charge,
                    pages = self.metadata.page_count,
                    "Query exhausted"
                );
                return Ok(None);
            };
            let cursor = &mut self.cursors[index];
            let Some(item) = cursor.buffer.pop_front() else {
                continue;
            };
            cursor.consumed += 1;
            self.phase = QueryPhase::Draining;
            return Ok(Some(item.value));
        }
    }

    /// Returns the next item deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the query, or
    /// [`CosmosError::Serialization`] if the item does not match `T`.
    pub async fn next_as<T: DeserializeOwned>(&mut self) -> Result<Option<T>, CosmosError> {
        match self.next_item().await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns the next page of at most the configured page size, or `None`
    /// once the query is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the query. Items of the partial page
    /// are dropped; ones already returned are not retracted.
    pub async fn next_page(&mut self) -> Result<Option<FeedPage>, CosmosError> {
        let charge_before = self.metadata.request_charge;
        let mut items = Vec::new();
        while items.len() < self.settings.page_size {
            match self.next_item().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        if items.is_empty() && self.phase.is_terminal() {
            return Ok(None);
        }
        Ok(Some(FeedPage {
            items,
            request_charge: self.metadata.request_charge - charge_before,
            continuation: self.continuation(),
        }))
    }

    /// Drains the query into a vector.
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the query.
    pub async fn collect_all(&mut self) -> Result<Vec<Value>, CosmosError> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Turns the executor into a stream of items.
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Value, CosmosError>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut executor = state?;
            match executor.next_item().await {
                Ok(Some(item)) => Some((Ok(item), Some(executor))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn plan(&mut self) -> Result<(), CosmosError> {
        self.phase = QueryPhase::Planning;
        let resume = self.resume.take();
        let options = self.options.options();

        let scope = if let Some(key) = &options.partition_key {
            Some(PartitionScope::Key(key.clone()))
        } else if !self.target.resource_type.is_partitioned() {
            Some(PartitionScope::Unpartitioned)
        } else {
            None
        };

        if let Some(scope) = scope {
            let (token, skip) = resume
                .and_then(|r| r.ranges.into_iter().next())
                .map_or((None, 0), |r| (r.token, r.skip));
            debug!(link = %self.target.link, %scope, "Planned single-partition query");
            let cursor = self.new_cursor(scope, token, skip);
            self.cursors.push(cursor);
        } else {
            let cross_partition = self.options.options().enable_cross_partition_query == Some(true);
            if matches!(self.target.kind, FeedKind::Query(_)) && !cross_partition {
                self.phase = QueryPhase::Failed;
                return Err(CosmosError::CrossPartitionRequired {
                    link: self.target.link.to_string(),
                });
            }
            match resume {
                Some(resume) => {
                    for range in resume.ranges {
                        let scope = PartitionScope::Range(PartitionKeyRange::new(
                            range.id, range.min, range.max,
                        ));
                        let cursor = self.new_cursor(scope, range.token, range.skip);
                        self.cursors.push(cursor);
                    }
                }
                None => {
                    for range in self.read_partition_map().await? {
                        let cursor = self.new_cursor(PartitionScope::Range(range), None, 0);
                        self.cursors.push(cursor);
                    }
                }
            }
            self.sort_cursors();
            debug!(
                link = %self.target.link,
                partitions = self.cursors.len(),
                ordered = self.is_ordered(),
                "Planned cross-partition query"
            );
        }

        self.planned = true;
        self.phase = QueryPhase::Fetching;
        Ok(())
    }

    async fn read_partition_map(&mut self) -> Result<Vec<PartitionKeyRange>, CosmosError> {
        loop {
            match self.transport.partition_ranges(&self.target.link).await {
                Ok(ranges) => return Ok(ranges),
                Err(e) if e.is_stale_partition_map() => {
                    self.note_refresh("*")?;
                }
                Err(e) => {
                    self.phase = QueryPhase::Failed;
                    return Err(e.into());
                }
            }
        }
    }

    fn note_refresh(&mut self, partition: &str) -> Result<(), CosmosError> {
        self.refreshes += 1;
        if self.refreshes > self.settings.partition_map_refresh_limit {
            return Err(self.fail(
                partition.to_string(),
                CosmosError::StalePartitionMap {
                    link: self.target.link.to_string(),
                },
            ));
        }
        warn!(
            link = %self.target.link,
            partition,
            attempt = self.refreshes,
            "Partition map is stale; refreshing"
        );
        Ok(())
    }

    fn new_cursor(&mut self, scope: PartitionScope, token: Option<String>, skip: usize) -> Cursor {
        self.next_cursor_id += 1;
        Cursor::new(self.next_cursor_id, scope, token, skip)
    }

    fn sort_cursors(&mut self) {
        self.cursors
            .sort_by(|a, b| a.scope.min_inclusive().cmp(b.scope.min_inclusive()));
    }

    /// Partitions to fetch ahead: those needing a page among the first
    /// `parallelism` live partitions.
    fn fetch_window(&self) -> Vec<u64> {
        let width = self.settings.parallelism(self.cursors.len());
        self.cursors
            .iter()
            .filter(|c| c.is_live())
            .take(width)
            .filter(|c| c.needs_fetch())
            .map(|c| c.id)
            .collect()
    }

    fn smallest_head(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, cursor) in self.cursors.iter().enumerate() {
            let Some(head) = cursor.buffer.front() else {
                continue;
            };
            let better = match best {
                None => true,
                Some(current) => {
                    let other = &self.cursors[current];
                    let Some(other_head) = other.buffer.front() else {
                        continue;
                    };
                    head.key
                        .compare(&other_head.key, &self.order)
                        .then_with(|| {
                            cursor
                                .scope
                                .min_inclusive()
                                .cmp(other.scope.min_inclusive())
                        })
                        .then_with(|| head.seq.cmp(&other_head.seq))
                        == Ordering::Less
                }
            };
            if better {
                best = Some(index);
            }
        }
        best
    }

    /// Fetches one page for each listed partition, `parallelism` at a time,
    /// applying results as they complete.
    async fn fetch(&mut self, ids: Vec<u64>) -> Result<(), CosmosError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.phase = QueryPhase::Fetching;
        let requests: Vec<(u64, FeedRequest)> = ids
            .into_iter()
            .filter_map(|id| {
                let cursor = self.cursors.iter().find(|c| c.id == id)?;
                Some((
                    id,
                    FeedRequest {
                        kind: self.target.kind.clone(),
                        resource_type: self.target.resource_type,
                        link: self.target.link.clone(),
                        scope: cursor.scope.clone(),
                        continuation: cursor.next_token.clone(),
                        options: self.options.clone(),
                    },
                ))
            })
            .collect();
        let parallelism = self.settings.parallelism(self.cursors.len());
        debug!(
            link = %self.target.link,
            pages = requests.len(),
            parallelism,
            "Fetching query pages"
        );

        let transport = Arc::clone(&self.transport);
        let mut pages = stream::iter(requests)
            .map(move |(id, request)| {
                let transport = Arc::clone(&transport);
                async move {
                    let continuation = request.continuation.clone();
                    let result = transport.query_page(request).await;
                    (id, continuation, result)
                }
            })
            .buffer_unordered(parallelism);

        while let Some((id, requested, result)) = pages.next().await {
            if self.phase.is_terminal() {
                break;
            }
            match result {
                Ok(page) => self.apply_page(id, requested, page),
                Err(e) => self.apply_failure(id, e).await?,
            }
        }
        Ok(())
    }

    fn apply_page(&mut self, id: u64, requested: Option<String>, page: FeedResponse) {
        let FeedResponse { items, envelope } = page;
        self.metadata.request_charge += envelope.request_charge;
        self.metadata.page_count += 1;
        if let Some(activity_id) = &envelope.activity_id {
            self.metadata.activity_ids.push(activity_id.clone());
        }
        if let Some(token) = &envelope.session_token {
            if let Some(tracker) = &self.session {
                tracker.observe(&self.target.link, token);
            }
            self.metadata.session_token = Some(token.clone());
        }

        let change_feed = matches!(self.target.kind, FeedKind::ChangeFeed { .. });
        let Some(cursor) = self.cursors.iter_mut().find(|c| c.id == id) else {
            return;
        };
        if let Some(metrics) = &envelope.query_metrics {
            self.metadata.query_metrics.accumulate(metrics);
            self.metadata
                .partition_metrics
                .entry(cursor.label())
                .or_default()
                .accumulate(metrics);
        }

        cursor.retries = 0;
        cursor.done = if change_feed {
            items.is_empty()
        } else {
            envelope.continuation.is_none()
        };
        cursor.page_token = requested;
        if envelope.continuation.is_some() || !change_feed {
            cursor.next_token.clone_from(&envelope.continuation);
        }
        let skip = std::mem::take(&mut cursor.skip).min(items.len());
        cursor.consumed = skip;
        debug!(
            partition = %cursor.scope,
            items = items.len(),
            request_charge = envelope.request_charge,
            more = !cursor.done,
            "Applied query page"
        );
        for item in items.into_iter().skip(skip) {
            let (key, value) = SortKey::of(item, &self.order);
            cursor.seq += 1;
            cursor.buffer.push_back(Buffered {
                key,
                value,
                seq: cursor.seq,
            });
        }
    }

    async fn apply_failure(&mut self, id: u64, error: TransportError) -> Result<(), CosmosError> {
        let Some(index) = self.cursors.iter().position(|c| c.id == id) else {
            return Ok(());
        };
        let label = self.cursors[index].label();

        if error.is_stale_partition_map() {
            self.note_refresh(&label)?;
            let PartitionScope::Range(stale) = self.cursors[index].scope.clone() else {
                return Ok(());
            };
            let ranges = match self.transport.partition_ranges(&self.target.link).await {
                Ok(ranges) => ranges,
                Err(e) if e.is_stale_partition_map() => return Ok(()),
                Err(e) => return Err(self.fail(label, e.into())),
            };
            let children: Vec<PartitionKeyRange> =
                ranges.into_iter().filter(|r| r.overlaps(&stale)).collect();
            if children.is_empty() {
                return Err(self.fail(
                    label,
                    CosmosError::StalePartitionMap {
                        link: self.target.link.to_string(),
                    },
                ));
            }
            let parent = self.cursors.remove(index);
            debug!(
                parent = %stale.id,
                children = children.len(),
                "Replacing split partition"
            );
            // A skip counts items of the parent's page. Children page
            // differently, so they re-read that page in full.
            if parent.skip > 0 {
                warn!(
                    parent = %stale.id,
                    skipped = parent.skip,
                    "Split during resume; items already delivered may repeat"
                );
            }
            for child in children {
                let cursor =
                    self.new_cursor(PartitionScope::Range(child), parent.next_token.clone(), 0);
                self.cursors.push(cursor);
            }
            self.sort_cursors();
            return Ok(());
        }

        let cursor = &mut self.cursors[index];
        if error.retryable && cursor.retries < self.settings.page_retry_limit {
            cursor.retries += 1;
            let delay = error.retry_after.unwrap_or(self.settings.page_retry_wait);
            warn!(
                partition = %cursor.scope,
                status = error.status_code,
                attempt = cursor.retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying query page"
            );
            tokio::time::sleep(delay).await;
            return Ok(());
        }
        Err(self.fail(label, CosmosError::Transport(error)))
    }

    fn fail(&mut self, partition: String, cause: CosmosError) -> CosmosError {
        warn!(link = %self.target.link, %partition, error = %cause, "Query failed");
        self.phase = QueryPhase::Failed;
        self.cursors.clear();
        CosmosError::QueryFailed {
            partition,
            cause: Box::new(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallelism_defaults_to_partition_count_with_ceiling() {
        let settings = ExecutorSettings::default();
        assert_eq!(settings.parallelism(0), 1);
        assert_eq!(settings.parallelism(3), 3);
        assert_eq!(settings.parallelism(40), MAX_AUTO_PARALLELISM);

        let negative = ExecutorSettings {
            max_degree_of_parallelism: -1,
            ..ExecutorSettings::default()
        };
        assert_eq!(negative.parallelism(5), 5);

        let explicit = ExecutorSettings {
            max_degree_of_parallelism: 2,
            ..ExecutorSettings::default()
        };
        assert_eq!(explicit.parallelism(40), 2);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(QueryPhase::Exhausted.is_terminal());
        assert!(QueryPhase::Failed.is_terminal());
        assert!(QueryPhase::Cancelled.is_terminal());
        assert!(!QueryPhase::Draining.is_terminal());
    }

    #[test]
    fn test_resume_point_of_partially_drained_page() {
        let mut cursor = Cursor::new(
            1,
            PartitionScope::Range(PartitionKeyRange::new("4", "3F", "7F")),
            Some("next".to_string()),
            0,
        );
        cursor.page_token = Some("this".to_string());
        cursor.consumed = 2;
        cursor.buffer.push_back(Buffered {
            key: SortKey::of(Value::Null, &[]).0,
            value: Value::Null,
            seq: 3,
        });

        let point = cursor.resume_point();
        assert_eq!(point.id, "4");
        assert_eq!(point.token.as_deref(), Some("this"));
        assert_eq!(point.skip, 2);

        cursor.buffer.clear();
        let point = cursor.resume_point();
        assert_eq!(point.token.as_deref(), Some("next"));
        assert_eq!(point.skip, 0);
    }
}
