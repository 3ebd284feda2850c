//! The built-in transforms.
//!
//! Each is a total function over a record collection. Records that are not
//! JSON objects pass through unchanged unless stated otherwise.

use serde_json::{Map, Value};
use tracing::debug;

use veritas_contracts::error::VeritasResult;
use veritas_core::planner::OWNER_RELATION;

fn strip_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("id");
            map.values_mut().for_each(strip_ids);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_ids),
        _ => {}
    }
}

/// Remove every `id` key, at the top level and in nested objects and lists.
pub fn remove_id(mut records: Vec<Value>) -> VeritasResult<Vec<Value>> {
    records.iter_mut().for_each(strip_ids);
    Ok(records)
}

fn flatten_into(prefix: &str, value: Value, out: &mut Map<String, Value>) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{prefix}.{k}")
        }
    };
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flatten_into(&key(&k), v, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.into_iter().enumerate() {
                flatten_into(&key(&i.to_string()), v, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other);
        }
    }
}

/// Flatten each record into one row with dotted column names.
///
/// Nested objects contribute `parent.child` columns; list elements
/// contribute `parent.<index>` columns (`interfaces.0.name`).
pub fn to_pandas(records: Vec<Value>) -> VeritasResult<Vec<Value>> {
    Ok(records
        .into_iter()
        .map(|record| match record {
            Value::Object(map) => {
                let mut row = Map::new();
                for (k, v) in map {
                    flatten_into(&k, v, &mut row);
                }
                Value::Object(row)
            }
            other => other,
        })
        .collect())
}

/// Replace each record by the list of its values, in key order.
pub fn values_only(records: Vec<Value>) -> VeritasResult<Vec<Value>> {
    Ok(records
        .into_iter()
        .map(|record| match record {
            Value::Object(map) => Value::Array(map.into_iter().map(|(_, v)| v).collect()),
            other => other,
        })
        .collect())
}

fn owner(record: &Map<String, Value>) -> Option<&Map<String, Value>> {
    let owner = match record.get(OWNER_RELATION)? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    owner.as_object().filter(|o| !o.is_empty())
}

/// Re-root address records to the device that owns them.
///
/// The owner is the first element of `primary_ip4_for`. The output record
/// is the device, extended with the address fields it does not already
/// have. Records without an owner are dropped.
pub fn ipaddress_to_device(records: Vec<Value>) -> VeritasResult<Vec<Value>> {
    let total = records.len();
    let devices: Vec<Value> = records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|record| {
            let mut device = owner(record)?.clone();
            for (k, v) in record {
                if k != OWNER_RELATION && !device.contains_key(k) {
                    device.insert(k.clone(), v.clone());
                }
            }
            Some(Value::Object(device))
        })
        .collect();

    debug!(
        records = total,
        devices = devices.len(),
        dropped = total - devices.len(),
        "addresses re-rooted to owning devices"
    );
    Ok(devices)
}
