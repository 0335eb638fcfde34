//! The transport seam.
//!
//! The session core never talks HTTP itself. Every network call goes
//! through the [`Transport`] trait, which performs one logical operation
//! and returns a [`ResponseEnvelope`] or a [`TransportError`]. The crate
//! ships [`HttpTransport`], a REST implementation on `reqwest`; tests and
//! embedders can supply their own.
//!
//! # Implementing a transport
//!
//! ```rust
//! use async_trait::async_trait;
//! use cosmosdb::resource::{PartitionKeyRange, ResourceLink, ResponseEnvelope};
//! use cosmosdb::transport::{FeedRequest, FeedResponse, PointRequest, Transport, TransportError};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl Transport for Offline {
//!     async fn execute(&self, _: PointRequest) -> Result<ResponseEnvelope, TransportError> {
//!         Err(TransportError::new(503, "offline"))
//!     }
//!
//!     async fn query_page(&self, _: FeedRequest) -> Result<FeedResponse, TransportError> {
//!         Err(TransportError::new(503, "offline"))
//!     }
//!
//!     async fn partition_ranges(
//!         &self,
//!         _: &ResourceLink,
//!     ) -> Result<Vec<PartitionKeyRange>, TransportError> {
//!         Ok(vec![PartitionKeyRange::new("0", "", "FF")])
//!     }
//! }
//! ```

pub mod auth;
mod errors;
mod headers;
mod http;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::query::Query;
use crate::request::OptionSet;
use crate::resource::{
    PartitionKey, PartitionKeyRange, ResourceLink, ResourceType, ResponseEnvelope,
};

pub use errors::{
    TransportError, SUB_STATUS_COMPLETING_PARTITION_MIGRATION, SUB_STATUS_COMPLETING_SPLIT,
    SUB_STATUS_PARTITION_KEY_RANGE_GONE,
};
pub use headers::API_VERSION;
pub use http::{HttpTransport, SDK_VERSION};

/// A point operation on a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create; conflicts with an existing id.
    Create,
    /// Read one resource.
    Read,
    /// Replace an existing resource.
    Replace,
    /// Create or replace.
    Upsert,
    /// Delete one resource.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Replace => "replace",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A point operation request.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRequest {
    /// What to do.
    pub operation: Operation,
    /// Type of the target resource.
    pub resource_type: ResourceType,
    /// Link of the parent (the feed a create or upsert posts into).
    pub parent: ResourceLink,
    /// Link of the target resource.
    pub link: ResourceLink,
    /// Body of creates, replaces and upserts.
    pub payload: Option<Value>,
    /// Composed request options.
    pub options: OptionSet,
}

/// What a feed request reads.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedKind {
    /// A SQL query (listings run `SELECT * FROM root r`).
    Query(Query),
    /// The incremental change feed.
    ChangeFeed {
        /// Read from the beginning instead of from now when no
        /// continuation is given.
        start_from_beginning: bool,
    },
}

/// Which partitions a feed request addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionScope {
    /// Feeds that are not partitioned (databases, containers, users).
    Unpartitioned,
    /// One logical partition.
    Key(PartitionKey),
    /// One physical partition key range.
    Range(PartitionKeyRange),
}

impl PartitionScope {
    /// Returns the lower bound used to order partitions.
    #[must_use]
    pub fn min_inclusive(&self) -> &str {
        match self {
            Self::Range(range) => &range.min_inclusive,
            Self::Unpartitioned | Self::Key(_) => "",
        }
    }
}

impl fmt::Display for PartitionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpartitioned => f.write_str("unpartitioned"),
            Self::Key(key) => write!(f, "key {key}"),
            Self::Range(range) => write!(f, "range {}", range.id),
        }
    }
}

/// One page request of a query, listing or change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    /// What to read.
    pub kind: FeedKind,
    /// Type of the listed resources.
    pub resource_type: ResourceType,
    /// Link of the parent whose feed is read.
    pub link: ResourceLink,
    /// Partition addressed by this page.
    pub scope: PartitionScope,
    /// Service continuation of the page, absent for the first page.
    pub continuation: Option<String>,
    /// Composed request options.
    pub options: OptionSet,
}

/// One page of a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedResponse {
    /// Items of the page.
    pub items: Vec<Value>,
    /// Response metadata; `continuation` is absent on the last page.
    pub envelope: ResponseEnvelope,
}

/// Performs single logical operations against the service.
///
/// Implementations classify failures as retryable or not and never retry
/// on behalf of the caller. They are shared across tasks, so they must be
/// `Send + Sync`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes a point operation.
    async fn execute(&self, request: PointRequest) -> Result<ResponseEnvelope, TransportError>;

    /// Fetches one page of a feed.
    async fn query_page(&self, request: FeedRequest) -> Result<FeedResponse, TransportError>;

    /// Returns the partition key ranges of a container, ordered by lower
    /// bound.
    async fn partition_ranges(
        &self,
        container: &ResourceLink,
    ) -> Result<Vec<PartitionKeyRange>, TransportError>;
}
