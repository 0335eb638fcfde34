//! Dependencies shared by every resource handle of a client.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::CosmosConfig;
use crate::error::CosmosError;
use crate::query::{ExecutorSettings, FeedTarget, QueryExecutor};
use crate::request::{compose, OperationScope, OptionDefaults, RequestOptions};
use crate::resource::{ResourceLink, ResourceResponse, ResourceType};
use crate::session::SessionTracker;
use crate::transport::{Operation, PointRequest, Transport, TransportError};

/// The transport, session state and configuration of one client.
///
/// Handles ([`Database`](crate::Database), [`Container`](crate::Container))
/// receive a clone at construction instead of reaching back into the client.
/// Cloning is cheap; every clone shares the same session tracker.
#[derive(Clone)]
pub struct ClientContext {
    transport: Arc<dyn Transport>,
    session: Arc<SessionTracker>,
    config: Arc<CosmosConfig>,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("endpoint", self.config.endpoint())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// Verify ClientContext is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientContext>();
};

/// A point operation as the facade describes it.
pub(crate) struct PointCall {
    pub operation: Operation,
    pub resource_type: ResourceType,
    pub parent: ResourceLink,
    pub link: ResourceLink,
    pub payload: Option<Value>,
    pub scope: OperationScope,
    /// Link whose session token the call reads and advances.
    pub session_link: ResourceLink,
}

impl ClientContext {
    /// Creates a context with a fresh session tracker.
    #[must_use]
    pub fn new(config: CosmosConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            session: Arc::new(SessionTracker::new()),
            config: Arc::new(config),
        }
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns the session tracker.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionTracker> {
        &self.session
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &CosmosConfig {
        &self.config
    }

    /// Returns the option defaults for a call against `session_link`.
    #[must_use]
    pub fn defaults(&self, session_link: &ResourceLink) -> OptionDefaults {
        OptionDefaults {
            session_token: self.session.current_token(session_link),
            consistency_level: Some(self.config.consistency_level()),
            max_item_count: self.config.max_item_count(),
            max_degree_of_parallelism: None,
        }
    }

    pub(crate) async fn execute(
        &self,
        call: PointCall,
        options: &RequestOptions,
    ) -> Result<ResourceResponse<Value>, CosmosError> {
        let defaults = self.defaults(&call.session_link);
        let options = compose(options, &defaults, call.scope)?;
        debug!(operation = %call.operation, link = %call.link, "Executing point operation");

        let request = PointRequest {
            operation: call.operation,
            resource_type: call.resource_type,
            parent: call.parent,
            link: call.link.clone(),
            payload: call.payload,
            options,
        };
        match self.transport.execute(request).await {
            Ok(envelope) => {
                if let Some(token) = &envelope.session_token {
                    self.session.observe(&call.session_link, token);
                }
                Ok(ResourceResponse::from_envelope(envelope))
            }
            Err(error) => Err(classify(error, call.operation, &call.link)),
        }
    }

    /// Starts a feed read and fetches its first pages.
    pub(crate) async fn feed(
        &self,
        target: FeedTarget,
        options: &RequestOptions,
        scope: OperationScope,
    ) -> Result<QueryExecutor, CosmosError> {
        let defaults = self.defaults(&target.link);
        let options = compose(options, &defaults, scope)?;
        let settings = ExecutorSettings::new(&self.config, &options);
        let mut executor = QueryExecutor::new(Arc::clone(&self.transport), target, options, settings)?
            .with_session_tracker(Arc::clone(&self.session));
        executor.prime().await?;
        Ok(executor)
    }
}

/// Maps a transport failure onto the error a caller of `operation` expects.
///
/// Only creates report conflicts as [`CosmosError::AlreadyExists`]; an
/// upsert conflict stays a transport failure.
pub(crate) fn classify(error: TransportError, operation: Operation, link: &ResourceLink) -> CosmosError {
    let link = link.to_string();
    match error.status_code {
        404 => CosmosError::NotFound { link },
        409 if operation == Operation::Create => CosmosError::AlreadyExists { link },
        412 => CosmosError::AccessConditionFailed { link },
        _ => CosmosError::Transport(error),
    }
}
