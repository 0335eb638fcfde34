//! Per-call request options.
//!
//! Callers pass [`RequestOptions`]; the facade merges them over the
//! client's [`OptionDefaults`] with [`compose`] for a given
//! [`OperationScope`], producing the [`OptionSet`] handed to the transport.

mod options;

pub(crate) use options::coerce_integer;
pub use options::{
    compose, AccessCondition, OperationScope, OptionDefaults, OptionSet, RequestOption,
    RequestOptions,
};
