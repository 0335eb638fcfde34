//! Resource addressing.
//!
//! Every resource lives at a hierarchical link under the account:
//!
//! - `dbs/{db}` for databases
//! - `dbs/{db}/colls/{container}` for containers
//! - `dbs/{db}/colls/{container}/docs/{item}` for items
//! - `dbs/{db}/users/{user}` for users
//! - `dbs/{db}/colls/{container}/sprocs/{id}`, `.../triggers/{id}` and
//!   `.../udfs/{id}` for server-side scripts
//!
//! Links are synthesized from ids until a resource has been read from the
//! service; after that its server-assigned `_self` link is used verbatim.
//! [`ResourceRef`] makes that choice explicit at the call boundary.
//!
//! # Example
//!
//! ```rust
//! use cosmosdb::resource::{link_for, ResourceLink, ResourceRef, ResourceType};
//!
//! let database = ResourceLink::root().child(ResourceType::Database, "store").unwrap();
//! let container = database.child(ResourceType::Container, "orders").unwrap();
//!
//! let by_id = link_for(&container, ResourceType::Item, &ResourceRef::from("order-1")).unwrap();
//! assert_eq!(by_id.as_str(), "dbs/store/colls/orders/docs/order-1");
//!
//! let materialized = ResourceRef::Materialized("dbs/AbC==/colls/AbCd=/docs/AbCdE=/".into());
//! let verbatim = link_for(&container, ResourceType::Item, &materialized).unwrap();
//! assert_eq!(verbatim.as_str(), "dbs/AbC==/colls/AbCd=/docs/AbCdE=/");
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::CosmosError;

/// Characters the service reserves in resource ids.
const RESERVED_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Kinds of addressable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// A database (`dbs`).
    Database,
    /// A container, called a collection on the wire (`colls`).
    Container,
    /// An item, called a document on the wire (`docs`).
    Item,
    /// A database user (`users`).
    User,
    /// A stored procedure of a container (`sprocs`).
    StoredProcedure,
    /// A pre- or post-trigger of a container (`triggers`).
    Trigger,
    /// A user-defined function of a container (`udfs`).
    UserDefinedFunction,
    /// A physical partition key range of a container (`pkranges`).
    PartitionKeyRange,
}

impl ResourceType {
    /// Returns the path segment used for this type in links.
    #[must_use]
    pub const fn path_segment(&self) -> &'static str {
        match self {
            Self::Database => "dbs",
            Self::Container => "colls",
            Self::Item => "docs",
            Self::User => "users",
            Self::StoredProcedure => "sprocs",
            Self::Trigger => "triggers",
            Self::UserDefinedFunction => "udfs",
            Self::PartitionKeyRange => "pkranges",
        }
    }

    /// Returns the human-readable type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Database => "Database",
            Self::Container => "Container",
            Self::Item => "Item",
            Self::User => "User",
            Self::StoredProcedure => "StoredProcedure",
            Self::Trigger => "Trigger",
            Self::UserDefinedFunction => "UserDefinedFunction",
            Self::PartitionKeyRange => "PartitionKeyRange",
        }
    }

    /// Returns the key under which feed responses list this type.
    #[must_use]
    pub const fn feed_key(&self) -> &'static str {
        match self {
            Self::Database => "Databases",
            Self::Container => "DocumentCollections",
            Self::Item => "Documents",
            Self::User => "Users",
            Self::StoredProcedure => "StoredProcedures",
            Self::Trigger => "Triggers",
            Self::UserDefinedFunction => "UserDefinedFunctions",
            Self::PartitionKeyRange => "PartitionKeyRanges",
        }
    }

    /// Returns `true` if feeds of this type are spread over partitions.
    #[must_use]
    pub const fn is_partitioned(&self) -> bool {
        matches!(self, Self::Item)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks that `id` can be used as a path component.
///
/// # Errors
///
/// Returns [`CosmosError::InvalidIdentity`] when the id is empty, contains a
/// reserved character, or ends in whitespace.
pub fn validate_id(id: &str) -> Result<(), CosmosError> {
    let invalid = |reason| CosmosError::InvalidIdentity {
        id: id.to_string(),
        reason,
    };
    if id.is_empty() {
        return Err(invalid("id cannot be empty"));
    }
    if id.contains(RESERVED_ID_CHARS) {
        return Err(invalid("id cannot contain '/', '\\', '?' or '#'"));
    }
    if id.ends_with(char::is_whitespace) {
        return Err(invalid("id cannot end with whitespace"));
    }
    Ok(())
}

/// A canonical resource path relative to the account endpoint.
///
/// The account root is the empty link. Links never start with `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceLink(String);

impl ResourceLink {
    /// Returns the account root link.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Wraps a link returned by the service without re-validating it.
    #[must_use]
    pub fn materialized(link: impl Into<String>) -> Self {
        Self(link.into().trim_start_matches('/').to_string())
    }

    /// Returns the link of a child resource.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if `id` is not a valid id.
    pub fn child(&self, resource_type: ResourceType, id: &str) -> Result<Self, CosmosError> {
        validate_id(id)?;
        Ok(Self(format!("{}/{id}", self.feed(resource_type))))
    }

    /// Returns the path of the feed of `resource_type` children under this link.
    #[must_use]
    pub fn feed(&self, resource_type: ResourceType) -> String {
        let parent = self.0.trim_end_matches('/');
        if parent.is_empty() {
            resource_type.path_segment().to_string()
        } else {
            format!("{parent}/{}", resource_type.path_segment())
        }
    }

    /// Returns `true` for the account root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the link as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourceLink {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference to a resource: either a bare id or a materialized self-link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    /// An id, resolved against the parent link of the call.
    Id(String),
    /// The server-assigned `_self` link of a resource that was read.
    Materialized(String),
}

impl ResourceRef {
    /// Builds a reference from a resource's properties, preferring `_self`.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if the properties carry
    /// neither a `_self` link nor an `id`.
    pub fn from_properties(properties: &Value) -> Result<Self, CosmosError> {
        if let Some(link) = properties
            .get("_self")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        {
            return Ok(Self::Materialized(link.to_string()));
        }
        properties
            .get("id")
            .and_then(Value::as_str)
            .map(|id| Self::Id(id.to_string()))
            .ok_or_else(|| CosmosError::InvalidIdentity {
                id: String::new(),
                reason: "properties carry neither '_self' nor 'id'",
            })
    }

    /// Returns the id if this is an id reference.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Materialized(_) => None,
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for ResourceRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<&String> for ResourceRef {
    fn from(id: &String) -> Self {
        Self::Id(id.clone())
    }
}

/// Resolves a reference to a link.
///
/// Ids are appended to `parent`'s feed path; materialized links are returned
/// verbatim. The result depends only on the inputs.
///
/// # Errors
///
/// Returns [`CosmosError::InvalidIdentity`] if the id is invalid or the
/// materialized link is empty.
pub fn link_for(
    parent: &ResourceLink,
    resource_type: ResourceType,
    reference: &ResourceRef,
) -> Result<ResourceLink, CosmosError> {
    match reference {
        ResourceRef::Id(id) => parent.child(resource_type, id),
        ResourceRef::Materialized(link) if link.trim_matches('/').is_empty() => {
            Err(CosmosError::InvalidIdentity {
                id: link.clone(),
                reason: "materialized link cannot be empty",
            })
        }
        ResourceRef::Materialized(link) => Ok(ResourceLink::materialized(link.as_str())),
    }
}

/// The hierarchical identity of a database, container or item.
///
/// A container identity always embeds a valid database identity and an item
/// identity always embeds a valid container identity; the constructors make
/// any other shape unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    account_scope: String,
    database_id: String,
    container_id: Option<String>,
    item_id: Option<String>,
}

impl ResourceIdentity {
    /// Creates a database identity.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if `database_id` is invalid.
    pub fn database(
        account_scope: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Result<Self, CosmosError> {
        let database_id = database_id.into();
        validate_id(&database_id)?;
        Ok(Self {
            account_scope: account_scope.into(),
            database_id,
            container_id: None,
            item_id: None,
        })
    }

    /// Returns the identity of a container in this identity's database.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if `container_id` is invalid.
    pub fn container(&self, container_id: impl Into<String>) -> Result<Self, CosmosError> {
        let container_id = container_id.into();
        validate_id(&container_id)?;
        Ok(Self {
            account_scope: self.account_scope.clone(),
            database_id: self.database_id.clone(),
            container_id: Some(container_id),
            item_id: None,
        })
    }

    /// Returns the identity of an item in this identity's container.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::InvalidIdentity`] if `item_id` is invalid or
    /// this identity does not name a container.
    pub fn item(&self, item_id: impl Into<String>) -> Result<Self, CosmosError> {
        let item_id = item_id.into();
        if self.container_id.is_none() {
            return Err(CosmosError::InvalidIdentity {
                id: item_id,
                reason: "an item identity needs a container",
            });
        }
        validate_id(&item_id)?;
        Ok(Self {
            item_id: Some(item_id),
            ..self.clone()
        })
    }

    /// Returns the account scope (endpoint host) of this identity.
    #[must_use]
    pub fn account_scope(&self) -> &str {
        &self.account_scope
    }

    /// Returns the database id.
    #[must_use]
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Returns the container id, if this identity names a container or item.
    #[must_use]
    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    /// Returns the item id, if this identity names an item.
    #[must_use]
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    /// Returns the type of the resource this identity names.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        match (&self.container_id, &self.item_id) {
            (None, _) => ResourceType::Database,
            (Some(_), None) => ResourceType::Container,
            (Some(_), Some(_)) => ResourceType::Item,
        }
    }

    /// Returns the link of the database.
    #[must_use]
    pub fn database_link(&self) -> ResourceLink {
        ResourceLink(format!("dbs/{}", self.database_id))
    }

    /// Returns the link of the container, if any.
    #[must_use]
    pub fn container_link(&self) -> Option<ResourceLink> {
        self.container_id
            .as_ref()
            .map(|c| ResourceLink(format!("dbs/{}/colls/{c}", self.database_id)))
    }

    /// Returns the canonical link of the named resource.
    #[must_use]
    pub fn link(&self) -> ResourceLink {
        match (&self.container_id, &self.item_id) {
            (Some(c), Some(i)) => {
                ResourceLink(format!("dbs/{}/colls/{c}/docs/{i}", self.database_id))
            }
            (Some(c), None) => ResourceLink(format!("dbs/{}/colls/{c}", self.database_id)),
            _ => self.database_link(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_scope, self.link())
    }
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ResourceLink>();
    assert_send_sync::<ResourceRef>();
    assert_send_sync::<ResourceIdentity>();
};
