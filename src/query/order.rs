//! Ordering of JSON values the way the service sorts them.
//!
//! Values of different types order by type first:
//! undefined < null < false < true < numbers < strings < arrays < objects.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::OrderBy;

const fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(false)) => 2,
        Some(Value::Bool(true)) => 3,
        Some(Value::Number(_)) => 4,
        Some(Value::String(_)) => 5,
        Some(Value::Array(_)) => 6,
        Some(Value::Object(_)) => 7,
    }
}

/// Compares two possibly undefined JSON values.
#[must_use]
pub fn compare_json(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let by_type = type_rank(left).cmp(&type_rank(right));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_json(Some(x), Some(y)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            Value::Object(a.clone()).to_string().cmp(&Value::Object(b.clone()).to_string())
        }
        _ => Ordering::Equal,
    }
}

/// The sort key of one result item.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SortKey(Vec<Option<Value>>);

impl SortKey {
    /// Builds the key of `item` and returns it with the value to yield.
    ///
    /// Items rewritten by the service as `{"orderByItems": [...], "payload":
    /// ...}` are keyed by their `orderByItems` and yield their `payload`.
    pub(crate) fn of(item: Value, order: &[OrderBy]) -> (Self, Value) {
        if let Some(Value::Array(order_items)) = item.get("orderByItems") {
            let key = order_items
                .iter()
                .map(|entry| entry.get("item").cloned())
                .collect();
            let payload = item.get("payload").cloned().unwrap_or(Value::Null);
            return (Self(key), payload);
        }
        let key = order
            .iter()
            .map(|o| o.extract(&item).cloned())
            .collect();
        (Self(key), item)
    }

    /// Compares two keys under the direction of each sort term.
    pub(crate) fn compare(&self, other: &Self, order: &[OrderBy]) -> Ordering {
        for (i, (a, b)) in self.0.iter().zip(&other.0).enumerate() {
            let ordering = compare_json(a.as_ref(), b.as_ref());
            let ordering = if order.get(i).is_some_and(OrderBy::is_descending) {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    }
}
