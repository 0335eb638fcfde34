//! Queries and the cross-partition query engine.
//!
//! - [`Query`] carries SQL text, parameters and sort keys
//! - [`QueryExecutor`] fans a query out over partitions, merges ordered
//!   results and pages them with resumable continuations
//! - [`compare_json`] is the value ordering used for the merge
//!
//! # Example
//!
//! ```rust,ignore
//! let mut results = container
//!     .query_items(
//!         Query::new("SELECT * FROM c ORDER BY c.ts"),
//!         &RequestOptions::new().with_cross_partition_query(true),
//!     )
//!     .await?;
//!
//! while let Some(page) = results.next_page().await? {
//!     println!("{} items, {} RU", page.items.len(), page.request_charge);
//! }
//! println!("total: {} RU", results.request_charge());
//! ```

mod continuation;
mod definition;
mod executor;
mod order;

pub use definition::{OrderBy, Query, QueryParameter, SELECT_ALL};
pub use executor::{
    ExecutorSettings, FeedPage, FeedTarget, QueryExecutor, QueryMetadata, QueryPhase,
    DEFAULT_PAGE_SIZE, MAX_AUTO_PARALLELISM,
};
pub use order::compare_json;
