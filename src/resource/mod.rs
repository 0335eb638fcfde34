//! Resource addressing, partitioning and response types.
//!
//! - **[`ResourceLink`] / [`ResourceIdentity`]**: hierarchical addresses of
//!   databases, containers, items and users
//! - **[`ResourceRef`]**: an id or a materialized self-link, resolved by
//!   [`link_for`]
//! - **[`PartitionKey`], [`PartitionKeyDefinition`], [`PartitionKeyRange`]**:
//!   logical keys and the physical ranges they hash into
//! - **[`ResponseEnvelope`] / [`ResourceResponse<T>`]**: the payload and
//!   response metadata of a call
//! - **[`ContainerProperties`]**: writable container settings

mod link;
mod partition_key;
mod properties;
mod response;

pub use link::{
    link_for, validate_id, ResourceIdentity, ResourceLink, ResourceRef, ResourceType,
};
pub use partition_key::{PartitionKey, PartitionKeyDefinition, PartitionKeyRange};
pub use properties::ContainerProperties;
pub use response::{QueryMetrics, ResourceResponse, ResponseEnvelope};
