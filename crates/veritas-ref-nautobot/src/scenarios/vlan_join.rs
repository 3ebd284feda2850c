//! Scenario 3: VLAN Join
//!
//! Joins `nb.devices` to `nb.vlans` through the interfaces each VLAN is
//! tagged on:
//!
//! Sub-case A: every device with the first VLAN tagged on one of its interfaces
//! Sub-case B: the same join narrowed by a filter on the VLAN side
//! Sub-case C: a field selected on both sides, qualified by alias in the output
//! Sub-case D: VLAN fields around a device field, output in selection order

use serde_json::Value;

use veritas_contracts::error::VeritasResult;
use veritas_core::{Executor, Selection};

use crate::print_rows;

const CORRELATION: &str = "d.id = v.interfaces_as_tagged[0].device.id";

fn device_vlans<'e>(executor: &'e Executor, fields: &str) -> Selection<'e> {
    executor
        .select(fields)
        .using("nb.devices as d")
        .join("nb.vlans as v")
        .on(CORRELATION)
}

/// Hostname, VLAN id and VLAN name for every device/VLAN pair.
pub fn vlans_per_device(executor: &Executor, filter: &str) -> VeritasResult<Vec<Value>> {
    device_vlans(executor, "d.hostname, v.vid, v.name").where_(filter)
}

/// Both sides select `id`; each comes back qualified with its alias.
pub fn ids_per_pair(executor: &Executor) -> VeritasResult<Vec<Value>> {
    device_vlans(executor, "d.id, d.hostname, v.id").all()
}

/// VLAN id, hostname and VLAN name, keyed in that order.
pub fn vlan_first(executor: &Executor) -> VeritasResult<Vec<Value>> {
    device_vlans(executor, "v.vid, d.hostname, v.name").all()
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 3: VLAN Join.
pub fn run_scenario() -> VeritasResult<()> {
    println!("=== Scenario 3: VLAN Join ===");
    println!();

    let executor = crate::executor()?;

    println!("  join 'nb.vlans as v' on '{CORRELATION}'");
    println!();

    println!("  A. select 'd.hostname, v.vid, v.name'");
    print_rows(&vlans_per_device(&executor, "")?);
    println!();

    println!("  B. where 'v.vid=200'");
    print_rows(&vlans_per_device(&executor, "v.vid=200")?);
    println!();

    println!("  C. select 'd.id, d.hostname, v.id'");
    print_rows(&ids_per_pair(&executor)?);
    println!();

    println!("  D. select 'v.vid, d.hostname, v.name'");
    print_rows(&vlan_first(&executor)?);
    println!();

    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use veritas_contracts::{error::VeritasError, filter::Predicate};

    use super::*;
    use crate::{fixtures, lab_executor};

    #[test]
    fn test_devices_joined_to_tagged_vlans() {
        let (executor, log) = lab_executor(fixtures::lab_registry().unwrap());
        let rows = vlans_per_device(&executor, "").unwrap();
        assert_eq!(
            rows,
            vec![
                json!({ "hostname": "lab.local", "vid": 100, "name": "data" }),
                json!({ "hostname": "switch.local", "vid": 200, "name": "voice" }),
            ]
        );

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].endpoint, "nb.devices");
        assert!(log[0].selection.contains(&"id".to_string()));
        assert_eq!(log[1].endpoint, "nb.vlans");
        assert!(log[1].selection.contains(&"interfaces_as_tagged.device.id".to_string()));
    }

    #[test]
    fn test_vlan_side_filter_goes_to_vlan_request() {
        let (executor, log) = lab_executor(fixtures::lab_registry().unwrap());
        let rows = vlans_per_device(&executor, "v.vid=200").unwrap();
        assert_eq!(rows, vec![json!({ "hostname": "switch.local", "vid": 200, "name": "voice" })]);

        let log = log.lock().unwrap();
        assert_eq!(log[0].filter, Predicate::All);
        assert!(!log[1].filter.is_all());
    }

    #[test]
    fn test_shared_key_is_alias_qualified() {
        let executor = crate::executor().unwrap();
        let rows = ids_per_pair(&executor).unwrap();
        assert_eq!(rows[0], json!({ "d.id": "d-1", "hostname": "lab.local", "v.id": "v-1" }));
    }

    #[test]
    fn test_joined_keys_follow_selection_order() {
        let executor = crate::executor().unwrap();
        let rows = vlan_first(&executor).unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            let keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["vid", "hostname", "name"]);
        }
        assert_eq!(rows[0], json!({ "vid": 100, "hostname": "lab.local", "name": "data" }));
    }

    #[test]
    fn test_zero_padded_vid_matches() {
        let executor = crate::executor().unwrap();
        let rows = vlans_per_device(&executor, "v.vid=0100").unwrap();
        assert_eq!(rows, vec![json!({ "hostname": "lab.local", "vid": 100, "name": "data" })]);
    }

    #[test]
    fn test_mixed_or_across_sides_is_rejected() {
        let executor = crate::executor().unwrap();
        let err = vlans_per_device(&executor, "d.name=lab.local or v.vid=200").unwrap_err();
        assert!(matches!(err, VeritasError::JoinResolution { .. }));
    }
}
