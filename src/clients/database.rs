//! Database handles: containers and users.

use serde_json::Value;
use tracing::debug;

use crate::clients::client::read_options;
use crate::clients::context::{ClientContext, PointCall};
use crate::clients::Container;
use crate::error::CosmosError;
use crate::query::{FeedTarget, Query, QueryExecutor};
use crate::request::{OperationScope, RequestOptions};
use crate::resource::{
    link_for, validate_id, ContainerProperties, ResourceLink, ResourceRef, ResourceResponse,
    ResourceType,
};
use crate::transport::{FeedKind, Operation};

/// A handle to one database.
///
/// Holds the database link and the client context; obtaining one makes no
/// request.
#[derive(Debug, Clone)]
pub struct Database {
    context: ClientContext,
    link: ResourceLink,
}

// Verify Database is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Database>();
};

impl Database {
    pub(crate) const fn new(context: ClientContext, link: ResourceLink) -> Self {
        Self { context, link }
    }

    /// Returns the database link.
    #[must_use]
    pub const fn link(&self) -> &ResourceLink {
        &self.link
    }

    /// Returns the database id (the last segment of its link).
    #[must_use]
    pub fn id(&self) -> &str {
        last_segment(&self.link)
    }

    /// Reads the database.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn read(
        &self,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let call = self.call(
            Operation::Read,
            ResourceType::Database,
            self.link.clone(),
            None,
            OperationScope::ResourceRead,
        );
        self.context.execute(call, options).await
    }

    /// Returns a handle to a container of this database. No request is
    /// made; the partition key definition is read on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] for an invalid id.
    pub fn container(&self, container: impl Into<ResourceRef>) -> Result<Container, CosmosError> {
        let link = link_for(&self.link, ResourceType::Container, &container.into())?;
        Ok(Container::new(self.context.clone(), link))
    }

    /// Creates a container.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::AlreadyExists`] if a container with this id
    /// exists, or any other failure of the call.
    pub async fn create_container(
        &self,
        properties: &ContainerProperties,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = self.link.child(ResourceType::Container, &properties.id)?;
        let payload = serde_json::to_value(properties)?;
        let call = self.call(
            Operation::Create,
            ResourceType::Container,
            link,
            Some(payload),
            OperationScope::ContainerWrite,
        );
        self.context.execute(call, options).await
    }

    /// Creates a container, or reads it if it already exists.
    ///
    /// The properties of an existing container are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns any failure other than the conflict.
    pub async fn create_container_if_not_exists(
        &self,
        properties: &ContainerProperties,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        match self.create_container(properties, options).await {
            Err(CosmosError::AlreadyExists { link }) => {
                debug!(%link, "Container exists; reading it");
                self.get_container(properties.id.as_str(), &read_options(options))
                    .await
            }
            other => other,
        }
    }

    /// Reads the properties of a container.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn get_container(
        &self,
        container: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.container(container)?.read(options).await
    }

    /// Replaces the properties of a container.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist, or
    /// [`CosmosError::AccessConditionFailed`] if an access condition fails.
    pub async fn replace_container(
        &self,
        properties: &ContainerProperties,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = self.link.child(ResourceType::Container, &properties.id)?;
        let payload = serde_json::to_value(properties)?;
        let call = self.call(
            Operation::Replace,
            ResourceType::Container,
            link,
            Some(payload),
            OperationScope::ContainerWrite,
        );
        self.context.execute(call, options).await
    }

    /// Lists the containers of this database.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn list_containers(
        &self,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.query_containers(Query::select_all(), options).await
    }

    /// Queries the containers of this database.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn query_containers(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.feed(ResourceType::Container, query.into(), options).await
    }

    /// Deletes a container and every item in it. Its session token is
    /// forgotten.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn delete_container(
        &self,
        container: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, ResourceType::Container, &container.into())?;
        let call = self.call(
            Operation::Delete,
            ResourceType::Container,
            link.clone(),
            None,
            OperationScope::ResourceDelete,
        );
        let response = self.context.execute(call, options).await?;
        self.context.session().clear(&link);
        Ok(response)
    }

    /// Creates a user. `body` must carry an `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid, [`CosmosError::AlreadyExists`] if the user exists.
    pub async fn create_user(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_user(Operation::Create, body, options).await
    }

    /// Creates or replaces a user. `body` must carry an `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid.
    pub async fn upsert_user(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_user(Operation::Upsert, body, options).await
    }

    /// Reads a user.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn get_user(
        &self,
        user: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, ResourceType::User, &user.into())?;
        let call = self.call(
            Operation::Read,
            ResourceType::User,
            link,
            None,
            OperationScope::ResourceRead,
        );
        self.context.execute(call, options).await
    }

    /// Lists the users of this database.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn list_users(&self, options: &RequestOptions) -> Result<QueryExecutor, CosmosError> {
        self.query_users(Query::select_all(), options).await
    }

    /// Queries the users of this database.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn query_users(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.feed(ResourceType::User, query.into(), options).await
    }

    /// Deletes a user.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn delete_user(
        &self,
        user: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, ResourceType::User, &user.into())?;
        let call = self.call(
            Operation::Delete,
            ResourceType::User,
            link,
            None,
            OperationScope::ResourceDelete,
        );
        self.context.execute(call, options).await
    }

    async fn write_user(
        &self,
        operation: Operation,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let id = body_id(&body)?;
        let link = self.link.child(ResourceType::User, &id)?;
        let call = self.call(
            operation,
            ResourceType::User,
            link,
            Some(body),
            OperationScope::DatabaseWrite,
        );
        self.context.execute(call, options).await
    }

    async fn feed(
        &self,
        resource_type: ResourceType,
        query: Query,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        let target = FeedTarget {
            link: self.link.clone(),
            resource_type,
            kind: FeedKind::Query(query),
        };
        self.context.feed(target, options, OperationScope::Query).await
    }

    /// A call on this database or one of its children. Containers track
    /// their own session token; everything else shares the database's.
    fn call(
        &self,
        operation: Operation,
        resource_type: ResourceType,
        link: ResourceLink,
        payload: Option<Value>,
        scope: OperationScope,
    ) -> PointCall {
        let parent = match resource_type {
            ResourceType::Database => ResourceLink::root(),
            _ => self.link.clone(),
        };
        let session_link = match resource_type {
            ResourceType::Container => link.clone(),
            _ => self.link.clone(),
        };
        PointCall {
            operation,
            resource_type,
            parent,
            link,
            payload,
            scope,
            session_link,
        }
    }
}

/// Returns the validated `id` of a request body.
pub(crate) fn body_id(body: &Value) -> Result<String, CosmosError> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| CosmosError::InvalidIdentity {
            id: String::new(),
            reason: "body must carry a string 'id'",
        })?;
    validate_id(id)?;
    Ok(id.to_string())
}

pub(crate) fn last_segment(link: &ResourceLink) -> &str {
    link.as_str()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
