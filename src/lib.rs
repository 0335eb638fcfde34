//! # Cosmos DB Client
//!
//! A session-aware client for the Azure Cosmos DB SQL API, built around a
//! cross-partition query engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`CosmosConfig`] and [`CosmosConfigBuilder`]
//! - Canonical resource links and identities for databases, containers,
//!   items and users
//! - Request option composition with per-call overrides over client defaults
//! - Session token tracking per container, merged per partition range so a
//!   token never regresses
//! - A query executor that fans out over partition key ranges, merges
//!   `ORDER BY` results, pages with resumable continuations and survives
//!   partition splits
//! - A `Transport` seam with a master-key signed HTTPS implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use cosmosdb::{AccountEndpoint, AccountKey, ConsistencyLevel, CosmosConfig};
//!
//! let config = CosmosConfig::builder()
//!     .endpoint(AccountEndpoint::new("https://myaccount.documents.azure.com:443").unwrap())
//!     .key(AccountKey::new("c2VjcmV0LWtleQ==").unwrap())
//!     .consistency_level(ConsistencyLevel::Session)
//!     .max_degree_of_parallelism(4)
//!     .build()
//!     .unwrap();
//! ```
//!
//! ## Items and Queries
//!
//! ```rust,ignore
//! use cosmosdb::{ContainerProperties, CosmosClient, CosmosConfig, PartitionKeyDefinition, Query, RequestOptions};
//! use serde_json::json;
//!
//! let client = CosmosClient::new(CosmosConfig::from_connection_string(&connection)?)?;
//! client.create_database_if_not_exists("shop", &RequestOptions::new()).await?;
//!
//! let shop = client.database("shop")?;
//! shop.create_container_if_not_exists(
//!     &ContainerProperties::new("orders")
//!         .with_partition_key(PartitionKeyDefinition::new("/customerId")),
//!     &RequestOptions::new(),
//! )
//! .await?;
//!
//! let orders = shop.container("orders")?;
//! orders.upsert_item(&json!({"id": "1", "customerId": "c-7", "total": 12}), &RequestOptions::new()).await?;
//!
//! let mut totals = orders
//!     .query_items(
//!         Query::new("SELECT * FROM c ORDER BY c.total DESC"),
//!         &RequestOptions::new().with_cross_partition_query(true),
//!     )
//!     .await?;
//! while let Some(page) = totals.next_page().await? {
//!     println!("{} items, {} RU", page.items.len(), page.request_charge);
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`CosmosError`]. Conflicts, missing resources,
//! failed access conditions and query failures have their own variants;
//! everything else keeps the transport's status code and retry
//! classification:
//!
//! ```rust
//! use cosmosdb::CosmosError;
//!
//! fn describe(error: &CosmosError) -> &'static str {
//!     match error {
//!         CosmosError::AlreadyExists { .. } => "exists",
//!         CosmosError::NotFound { .. } => "missing",
//!         e if e.is_retryable() => "transient",
//!         _ => "failed",
//!     }
//! }
//!
//! assert_eq!(describe(&CosmosError::NotFound { link: "dbs/a".into() }), "missing");
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: every handle receives its transport, session
//!   tracker and configuration at construction
//! - **Fail-fast validation**: ids, options and configuration are validated
//!   before any request is sent
//! - **Thread-safe**: clients and handles are `Send + Sync`
//! - **Async-first**: designed for the Tokio runtime

pub mod clients;
pub mod config;
pub mod error;
pub mod query;
pub mod request;
pub mod resource;
pub mod session;
pub mod transport;

// Re-export public types at crate root for convenience
pub use config::{
    AccountEndpoint, AccountKey, ConnectionString, ConsistencyLevel, CosmosConfig,
    CosmosConfigBuilder,
};
pub use error::{ConfigError, CosmosError};

// Re-export facade types
pub use clients::{ClientContext, Container, CosmosClient, Database};

// Re-export the types most calls need
pub use query::{FeedPage, Query, QueryExecutor, QueryMetadata, QueryPhase};
pub use request::{AccessCondition, RequestOption, RequestOptions};
pub use resource::{
    ContainerProperties, PartitionKey, PartitionKeyDefinition, ResourceLink, ResourceRef,
    ResourceResponse, ResourceType,
};
pub use session::{SessionToken, SessionTracker};
pub use transport::{HttpTransport, Transport, TransportError};
