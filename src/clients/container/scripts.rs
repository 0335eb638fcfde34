//! Server-side scripts of a container: stored procedures, triggers and
//! user-defined functions.
//!
//! Scripts are plain JSON resources with an `id` and a `body` holding the
//! JavaScript source. They are not partitioned, so listings make one call
//! stream and never need cross-partition execution.

use serde_json::Value;

use super::Container;
use crate::clients::database::body_id;
use crate::error::CosmosError;
use crate::query::{FeedTarget, Query, QueryExecutor};
use crate::request::{OperationScope, RequestOptions};
use crate::resource::{link_for, ResourceRef, ResourceResponse, ResourceType};
use crate::transport::{FeedKind, Operation};

impl Container {
    /// Creates a stored procedure. The body must carry an `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid, or [`CosmosError::AlreadyExists`] if it exists.
    pub async fn create_stored_procedure(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_script(ResourceType::StoredProcedure, Operation::Create, None, body, options)
            .await
    }

    /// Creates or replaces a stored procedure.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid.
    pub async fn upsert_stored_procedure(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_script(ResourceType::StoredProcedure, Operation::Upsert, None, body, options)
            .await
    }

    /// Replaces a stored procedure.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn replace_stored_procedure(
        &self,
        procedure: impl Into<ResourceRef>,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let reference = Some(procedure.into());
        self.write_script(
            ResourceType::StoredProcedure,
            Operation::Replace,
            reference,
            body,
            options,
        )
        .await
    }

    /// Reads a stored procedure.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn get_stored_procedure(
        &self,
        procedure: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.read_script(ResourceType::StoredProcedure, procedure.into(), options)
            .await
    }

    /// Deletes a stored procedure.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn delete_stored_procedure(
        &self,
        procedure: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.delete_script(ResourceType::StoredProcedure, procedure.into(), options)
            .await
    }

    /// Lists the stored procedures of the container.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn list_stored_procedures(
        &self,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.query_stored_procedures(Query::select_all(), options)
            .await
    }

    /// Queries the stored procedures of the container.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn query_stored_procedures(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.script_feed(ResourceType::StoredProcedure, query.into(), options)
            .await
    }

    /// Creates a trigger. The body carries the `id`, the `body` source,
    /// `triggerType` (`Pre` or `Post`) and `triggerOperation`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid, or [`CosmosError::AlreadyExists`] if it exists.
    pub async fn create_trigger(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_script(ResourceType::Trigger, Operation::Create, None, body, options)
            .await
    }

    /// Creates or replaces a trigger.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid.
    pub async fn upsert_trigger(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_script(ResourceType::Trigger, Operation::Upsert, None, body, options)
            .await
    }

    /// Replaces a trigger.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn replace_trigger(
        &self,
        trigger: impl Into<ResourceRef>,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let reference = Some(trigger.into());
        self.write_script(ResourceType::Trigger, Operation::Replace, reference, body, options)
            .await
    }

    /// Reads a trigger.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn get_trigger(
        &self,
        trigger: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.read_script(ResourceType::Trigger, trigger.into(), options)
            .await
    }

    /// Deletes a trigger.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn delete_trigger(
        &self,
        trigger: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.delete_script(ResourceType::Trigger, trigger.into(), options)
            .await
    }

    /// Lists the triggers of the container.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn list_triggers(
        &self,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.query_triggers(Query::select_all(), options).await
    }

    /// Queries the triggers of the container.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn query_triggers(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.script_feed(ResourceType::Trigger, query.into(), options)
            .await
    }

    /// Creates a user-defined function. The body must carry an `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid, or [`CosmosError::AlreadyExists`] if it exists.
    pub async fn create_user_defined_function(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_script(
            ResourceType::UserDefinedFunction,
            Operation::Create,
            None,
            body,
            options,
        )
        .await
    }

    /// Creates or replaces a user-defined function.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the id is missing or
    /// invalid.
    pub async fn upsert_user_defined_function(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.write_script(
            ResourceType::UserDefinedFunction,
            Operation::Upsert,
            None,
            body,
            options,
        )
        .await
    }

    /// Replaces a user-defined function.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn replace_user_defined_function(
        &self,
        function: impl Into<ResourceRef>,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let reference = Some(function.into());
        self.write_script(
            ResourceType::UserDefinedFunction,
            Operation::Replace,
            reference,
            body,
            options,
        )
        .await
    }

    /// Reads a user-defined function.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn get_user_defined_function(
        &self,
        function: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.read_script(ResourceType::UserDefinedFunction, function.into(), options)
            .await
    }

    /// Deletes a user-defined function.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::NotFound`] if it does not exist.
    pub async fn delete_user_defined_function(
        &self,
        function: impl Into<ResourceRef>,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        self.delete_script(ResourceType::UserDefinedFunction, function.into(), options)
            .await
    }

    /// Lists the user-defined functions of the container.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn list_user_defined_functions(
        &self,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.query_user_defined_functions(Query::select_all(), options)
            .await
    }

    /// Queries the user-defined functions of the container.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first page.
    pub async fn query_user_defined_functions(
        &self,
        query: impl Into<Query>,
        options: &RequestOptions,
    ) -> Result<QueryExecutor, CosmosError> {
        self.script_feed(ResourceType::UserDefinedFunction, query.into(), options)
            .await
    }

    async fn write_script(
        &self,
        resource_type: ResourceType,
        operation: Operation,
        reference: Option<ResourceRef>,
        body: Value,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = match reference {
            Some(reference) => link_for(&self.link, resource_type, &reference)?,
            None => self.link.child(resource_type, &body_id(&body)?)?,
        };
        let call = self.call(
            operation,
            resource_type,
            link,
            Some(body),
            OperationScope::ScriptWrite,
        );
        self.context.execute(call, options).await
    }

    async fn read_script(
        &self,
        resource_type: ResourceType,
        reference: ResourceRef,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, resource_type, &reference)?;
        let call = self.call(
            Operation::Read,
            resource_type,
            link,
            None,
            OperationScope::ResourceRead,
        );
        self.context.execute(call, options).await
    }

    async fn delete_script(
        &self,
        resource_type: ResourceType,
        reference: ResourceRef,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let link = link_for(&self.link, resource_type, &reference)?;
        let call = self.call(
            Operation::Delete,
            resource_type,
            link,
            None,
            OperationScope::ResourceDelete,
        );
        self.context.execute(call, options).await
    }

    async fn script_feed(
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
        self.context
            .feed(target, options, OperationScope::Query)
            .await
    }
}
