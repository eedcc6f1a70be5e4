//! Aggregate result merging.
//!
//! A batch folds each child's result into one aggregate mapping. Mapping
//! results merge key-by-key, recursing where both sides are mappings and
//! otherwise keeping the later value. Children that return something other
//! than a mapping (a status string, a count) carry no merge key of their
//! own, so those are appended to a reserved `"results"` list instead.

use serde_json::map::Entry;
use serde_json::{Map, Value};
use tracing::warn;

/// Key under which non-mapping child results accumulate.
pub const RESULTS_LIST_KEY: &str = "results";

/// Fold one child result into the aggregate.
pub fn merge_result(aggregate: &mut Map<String, Value>, incoming: Value) {
    match incoming {
        Value::Object(map) => {
            for (key, value) in map {
                merge_entry(aggregate, key, value);
            }
        }
        Value::Null => {}
        other => push_unkeyed(aggregate, other),
    }
}

fn merge_entry(aggregate: &mut Map<String, Value>, key: String, value: Value) {
    match aggregate.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
        }
        Entry::Occupied(mut slot) => {
            let overwrote = match (slot.get_mut(), value) {
                (Value::Object(existing), Value::Object(incoming)) => {
                    for (k, v) in incoming {
                        merge_entry(existing, k, v);
                    }
                    false
                }
                (leaf, value) => {
                    *leaf = value;
                    true
                }
            };
            if overwrote {
                warn!(
                    "aggregate key {:?} written more than once; keeping the later value",
                    slot.key()
                );
            }
        }
    }
}

fn push_unkeyed(aggregate: &mut Map<String, Value>, value: Value) {
    match aggregate.entry(RESULTS_LIST_KEY) {
        Entry::Vacant(slot) => {
            slot.insert(Value::Array(vec![value]));
        }
        Entry::Occupied(mut slot) => match slot.get_mut() {
            Value::Array(list) => list.push(value),
            other => {
                let prior = other.take();
                *other = Value::Array(vec![prior, value]);
            }
        },
    }
}
