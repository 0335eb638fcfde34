//! The resource facade.
//!
//! # Overview
//!
//! - [`CosmosClient`]: account-level operations on databases
//! - [`Database`]: containers and users of one database
//! - [`Container`]: items, queries, the change feed and server-side
//!   scripts of one container
//! - [`ClientContext`]: the transport, session tracker and configuration
//!   every handle is constructed with
//!
//! Point operations are one transport call each: the handle builds the
//! link, composes options over the client defaults (including the last
//! session token of the container), calls the transport and records the
//! returned session token. Listings and queries hand off to a
//! [`QueryExecutor`](crate::query::QueryExecutor) that has already fetched
//! its first pages.
//!
//! # Status mapping
//!
//! | Status | Error |
//! |--------|-------|
//! | 404 | [`CosmosError::NotFound`](crate::CosmosError::NotFound) |
//! | 409 on create | [`CosmosError::AlreadyExists`](crate::CosmosError::AlreadyExists) |
//! | 412 | [`CosmosError::AccessConditionFailed`](crate::CosmosError::AccessConditionFailed) |
//! | anything else | [`CosmosError::Transport`](crate::CosmosError::Transport) |

mod client;
mod container;
mod context;
mod database;

pub use client::CosmosClient;
pub use container::Container;
pub use context::ClientContext;
pub use database::Database;
