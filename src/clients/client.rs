//! The account-level client.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::clients::context::{ClientContext, PointCall};
use crate::clients::Database;
use crate::config::CosmosConfig;
use crate::error::CosmosError;
use crate::query::{FeedTarget, Query, QueryExecutor};
use crate::request::{OperationScope, RequestOptions};
use crate::resource::{link_for, ResourceLink, ResourceRef, ResourceResponse, ResourceType};
use crate::session::SessionTracker;
use crate::transport::{FeedKind, HttpTransport, Operation, Transport};
use serde_json::Value;

/// Entry point for an account.
///
/// Owns the transport and the session tracker; [`Database`] and
/// [`Container`](crate::Container) handles obtained from it share both.
///
/// # Thread Safety
///
/// `CosmosClient` is `Clone`, `Send` and `Sync`. Clones share session state.
///
/// # Example
///
/// ```rust,ignore
/// use cosmosdb::{CosmosClient, CosmosConfig, RequestOptions};
///
/// let config = CosmosConfig::from_connection_string(&std::env::var("COSMOS_CONNECTION")?)?;
/// let client = CosmosClient::new(config)?;
///
/// client
///     .create_database_if_not_exists("shop", &RequestOptions::new())
///     .await?;
/// let orders = client.database("shop")?.container("orders")?;
/// ```
#[derive(Debug, Clone)]
pub struct CosmosClient {
    context: ClientContext,
}

// Verify CosmosClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CosmosClient>();
};

impl CosmosClient {
    /// Creates a client speaking HTTPS to the configured account.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new(config: CosmosConfig) -> Result<Self, CosmosError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client on top of any [`Transport`].
    #[must_use]
    pub fn with_transport(config: CosmosConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            context: ClientContext::new(config, transport),
        }
    }

    /// Returns the shared context.
    #[must_use]
    pub const fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &CosmosConfig {
        self.context.config()
    }

    /// Returns the session tracker shared by all handles of this client.
    #[must_use]
    pub const fn session_tracker(&self) -> &Arc<SessionTracker> {
        self.context.session()
    }

    /// Returns a handle to a database. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] for an invalid id.
    pub fn database(&self, database: impl Into<ResourceRef>) -> Result<Database, CosmosError> {
        let link = link_for(&ResourceLink::root(), ResourceType::Database, &database.into())?;
        Ok(Database::new(self.context.clone(), link))
    }

    /// Creates a database.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::AlreadyExists`] if a database with this id
    /// exists, or any other failure of the call.
    pub async fn create_database(
        &self,
        id: &str,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let root = ResourceLink::root();
        let link = root.child(ResourceType::Database, id)?;
        self.context
            .execute(
                PointCall {
                    operation: Operation::Create,
                    resource_type: ResourceType::Database,
                    parent: root,
                    link: link.clone(),
                    payload: Some(json!({ "id": id })),
                    scope: OperationScope::DatabaseWrite,
                    session_link: link,
                },
                options,
            )
            .await
    }

    /// Creates a database, or reads it if it already exists.
    ///
    /// # Errors
    ///
    /// Returns any failure other than the conflict.
    pub async fn create_database_if_not_exists(
        &self,
        id: &str,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        match self.create_database(id, options).await {
            Err(CosmosError::AlreadyExists { link }) => {
                debug!(%link, "Database exists; reading it");
                self.get_database(id, &read_options(options)).await
            }
            other => other,
        }
    }

    /// Reads a database.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn get_database(
        &self,
        database: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&ResourceLink::root(), ResourceType::Database, &database.into())?;
        self.context
            .execute(
                PointCall {
                    operation: Operation::Read,
                    resource_type: ResourceType::Database,
                    parent: ResourceLink::root(),
                    link: link.clone(),
                    payload: None,
                    scope: OperationScope::ResourceRead,
                    session_link: link,
                },
                options,
            )
            .await
    }

    /// Lists every database of the account.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn list_databases(
        &self,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.query_databases(Query::select_all(), options).await
    }

    /// Queries the databases of the account.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn query_databases(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        let target = FeedTarget {
            link: ResourceLink::root(),
            resource_type: ResourceType::Database,
            kind: FeedKind::Query(query.into()),
        };
        self.context.feed(target, options, OperationScope::Query).await
    }

    /// Deletes a database and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn delete_database(
        &self,
        database: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&ResourceLink::root(), ResourceType::Database, &database.into())?;
        self.context
            .execute(
                PointCall {
                    operation: Operation::Delete,
                    resource_type: ResourceType::Database,
                    parent: ResourceLink::root(),
                    link: link.clone(),
                    payload: None,
                    scope: OperationScope::ResourceDelete,
                    session_link: link,
                },
                options,
            )
            .await
    }
}

/// Narrows create options to those a follow-up read accepts.
pub(crate) fn read_options(options: &RequestOptions) -> RequestOptions {
    let mut options = options.clone();
    options.offer_throughput = None;
    options
}
