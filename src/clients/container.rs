//! Container handles: items, queries and the change feed. Script
//! operations live in the `scripts` submodule.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::clients::context::{ClientContext, PointCall};
use crate::clients::database::{body_id, last_segment};
use crate::error::CosmosError;
use crate::query::{FeedTarget, Query, QueryExecutor};
use crate::request::{OperationScope, RequestOptions};
use crate::resource::{
    link_for, ContainerProperties, PartitionKeyDefinition, ResourceLink, ResourceRef,
    ResourceResponse, ResourceType,
};
use crate::transport::{FeedKind, Operation};

mod scripts;

/// A handle to one container.
///
/// Item writes without an explicit partition key take it from the body,
/// using the container's partition key definition. The definition is read
/// from the service on first need and cached by the handle and its clones.
///
/// # Example
///
/// ```rust,ignore
/// use cosmosdb::{Query, RequestOptions};
/// use serde_json::json;
///
/// let orders = client.database("shop")?.container("orders")?;
/// orders
///     .create_item(&json!({"id": "1", "customerId": "c-7", "total": 12}), &RequestOptions::new())
///     .await?;
///
/// let mut results = orders
///     .query_items(
///         Query::new("SELECT * FROM c WHERE c.total > @min ORDER BY c.total")
///             .with_parameter("@min", json!(10)),
///         &RequestOptions::new().with_cross_partition_query(true),
///     )
///     .await?;
/// while let Some(order) = results.next_item().await? {
///     println!("{order}");
/// }
/// println!("charge: {}", results.request_charge());
/// ```
#[derive(Debug, Clone)]
pub struct Container {
    context: ClientContext,
    link: ResourceLink,
    properties: Arc<RwLock<Option<ContainerProperties>>>,
}

// Verify Container is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Container>();
};

impl Container {
    pub(crate) fn new(context: ClientContext, link: ResourceLink) -> Self {
        Self {
            context,
            link,
            properties: Arc::new(RwLock::new(None)),
        }
    }

    /// Uses `definition` instead of reading it from the service.
    #[must_use]
    pub fn with_partition_key_definition(self, definition: PartitionKeyDefinition) -> Self {
        let properties = ContainerProperties::new(self.id()).with_partition_key(definition);
        *self.properties.write() = Some(properties);
        self
    }

    /// Returns the container link.
    #[must_use]
    pub const fn link(&self) -> &ResourceLink {
        &self.link
    }

    /// Returns the container id (the last segment of its link).
    #[must_use]
    pub fn id(&self) -> &str {
        last_segment(&self.link)
    }

    /// Reads the container properties and caches its partition key
    /// definition.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if the container does not exist.
    pub async fn read(
        &self,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let parent = ResourceLink::materialized(
            self.link
                .as_str()
                .trim_end_matches('/')
                .rsplit_once("/colls/")
                .map_or("", |(database, _)| database),
        );
        let call = PointCall {
            operation: Operation::Read,
            resource_type: ResourceType::Container,
            parent,
            link: self.link.clone(),
            payload: None,
            scope: OperationScope::ResourceRead,
            session_link: self.link.clone(),
        };
        let response = self.context.execute(call, options).await?;
        if let Ok(properties) = ContainerProperties::deserialize(response.data()) {
            *self.properties.write() = Some(properties);
        }
        Ok(response)
    }

    /// Returns the partition key definition, reading the container once if
    /// it is not known yet. `None` for containers without one.
    ///
    /// # Errors
    ///
    /// Returns the failure of the container read.
    pub async fn partition_key_definition(
        &self,
    ) -> Result<Option<PartitionKeyDefinition>, CosmosError> {
        let cached = self.properties.read().clone();
        if let Some(properties) = cached {
            return Ok(properties.partition_key);
        }
        debug!(link = %self.link, "Reading container to learn its partition key");
        self.read(&RequestOptions::new()).await?;
        let learned = self.properties.read().clone();
        Ok(learned.and_then(|properties| properties.partition_key))
    }

    /// Creates an item. The body must carry an `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid, [`CosmosError::AlreadyExists`] if an item with this id
    /// exists in the partition.
    pub async fn create_item<T: Serialize + Sync>(
        &self,
        item: &T,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let body = serde_json::to_value(item)?;
        self.write_item(Operation::Create, None, body, options).await
    }

    /// Creates or replaces an item. Never reports
    /// [`CosmosError::AlreadyExists`].
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid.
    pub async fn upsert_item<T: Serialize + Sync>(
        &self,
        item: &T,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let body = serde_json::to_value(item)?;
        self.write_item(Operation::Upsert, None, body, options).await
    }

    /// Replaces an existing item.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if the item does not exist, or
    /// [`CosmosError::AccessConditionFailed`] if an access condition fails.
    pub async fn replace_item<T: Serialize + Sync>(
        &self,
        item: impl Into<ResourceRef>,
        body: &T,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let reference = item.into();
        let body = serde_json::to_value(body)?;
        self.write_item(Operation::Replace, Some(reference), body, options)
            .await
    }

    /// Reads an item. Partitioned containers need the item's partition key
    /// in `options`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if the item does not exist.
    pub async fn get_item(
        &self,
        item: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, ResourceType::Item, &item.into())?;
        let call = self.call(
            Operation::Read,
            ResourceType::Item,
            link,
            None,
            OperationScope::ItemRead,
        );
        self.context.execute(call, options).await
    }

    /// Deletes an item. Partitioned containers need the item's partition
    /// key in `options`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if the item does not exist.
    pub async fn delete_item(
        &self,
        item: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, ResourceType::Item, &item.into())?;
        let call = self.call(
            Operation::Delete,
            ResourceType::Item,
            link,
            None,
            OperationScope::ItemWrite,
        );
        self.context.execute(call, options).await
    }

    /// Lists the items of the container.
    ///
    /// Without a partition key in `options`, cross-partition execution must
    /// be enabled.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::CrossPartitionRequired`] or the failure of
    /// the first pages.
    pub async fn list_items(&self, options: &RequestOptions) -> Result<QueryExecutor, CosmosError> {
        self.query_items(Query::select_all(), options).await
    }

    /// Queries the items of the container.
    ///
    /// The first pages are fetched before this returns, so the metadata of
    /// the returned executor is populated at once.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::CrossPartitionRequired`] if no partition key
    /// is given and cross-partition execution is not enabled (no request is
    /// made), or the failure of the first pages.
    pub async fn query_items(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        let target = FeedTarget {
            link: self.link.clone(),
            resource_type: ResourceType::Item,
            kind: FeedKind::Query(query.into()),
        };
        self.context
            .feed(target, options, OperationScope::Query)
            .await
    }

    /// Reads the change feed of the container, one stream per partition
    /// range.
    ///
    /// Without a `continuation`, reading starts from the beginning of the
    /// container's history or, when `start_from_beginning` is `false`, from
    /// now. The executor's continuation resumes where it stopped.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first pages.
    pub async fn query_items_change_feed(
        &self,
        start_from_beginning: bool,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        let target = FeedTarget {
            link: self.link.clone(),
            resource_type: ResourceType::Item,
            kind: FeedKind::ChangeFeed {
                start_from_beginning,
            },
        };
        self.context
            .feed(target, options, OperationScope::ChangeFeed)
            .await
    }

    async fn write_item(
        &self,
        operation: Operation,
        reference: Option<ResourceRef>,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = match reference {
            Some(reference) => link_for(&self.link, ResourceType::Item, &reference)?,
            None => self.link.child(ResourceType::Item, &body_id(&body)?)?,
        };
        let options = self.with_partition_key(&body, options).await?;
        let call = self.call(
            operation,
            ResourceType::Item,
            link,
            Some(body),
            OperationScope::ItemWrite,
        );
        self.context.execute(call, &options).await
    }

    /// Fills in the partition key from `body` unless the caller gave one.
    async fn with_partition_key(
        &self,
        body: &Value,
        options: &RequestOptions,
    ) -> Result<RequestOptions, CosmosError> {
        let mut options = options.clone();
        if options.partition_key.is_none() {
            if let Some(definition) = self.partition_key_definition().await? {
                options.partition_key = definition.extract(body);
            }
        }
        Ok(options)
    }

    /// A call on an item or script of this container. All of them share
    /// the container's session token.
    fn call(
        &self,
        operation: Operation,
        resource_type: ResourceType,
        link: ResourceLink,
        payload: Option<Value>,
        scope: OperationScope,
    ) -> PointCall {
        PointCall {
            operation,
            resource_type,
            parent: self.link.clone(),
            link,
            payload,
            scope,
            session_link: self.link.clone(),
        }
    }
}
