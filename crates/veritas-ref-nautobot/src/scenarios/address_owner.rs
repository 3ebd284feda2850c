//! Scenario 4: Address Owner
//!
//! Re-roots `nb.ipaddresses` records to the device that uses each address as
//! its primary IPv4 address, with the `ipaddress_to_device` transform.
//!
//! Sub-case A: owner fields selected explicitly
//! Sub-case B: owner relation left out of the selection; the planner adds it
//! Sub-case C: the owner's id stripped afterwards with `remove_id`
//! Sub-case D: owners narrowed by a custom field of the owning device

use serde_json::Value;

use veritas_contracts::error::VeritasResult;
use veritas_core::Executor;

use crate::print_rows;

/// Addresses inside `network`, one row per owning device.
pub fn owners_in(executor: &Executor, network: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select("address, primary_ip4_for.name, primary_ip4_for.serial")
        .using("nb.ipaddresses")
        .transform("ipaddress_to_device")
        .where_(&format!("prefix={network}"))
}

/// Like `owners_in`, keeping only owners whose `net` custom field is `net`.
///
/// `pip4for_cf_net` filters the owner list, not the addresses; an address
/// left without owners is dropped by the transform.
pub fn owners_on_net(executor: &Executor, network: &str, net: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select("address, primary_ip4_for.name, primary_ip4_for.serial")
        .using("nb.ipaddresses")
        .transform("ipaddress_to_device")
        .where_(&format!("prefix={network} and pip4for_cf_net={net}"))
}

/// Like `owners_in`, selecting only the address.
pub fn owners_by_address(executor: &Executor, transforms: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select("address, dns_name")
        .using("nb.ipaddresses")
        .transform(transforms)
        .all()
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 4: Address Owner.
pub fn run_scenario() -> VeritasResult<()> {
    println!("=== Scenario 4: Address Owner ===");
    println!();

    let executor = crate::executor()?;

    println!("  A. select 'address, primary_ip4_for.name, primary_ip4_for.serial' where 'prefix=192.168.0.0/16'");
    print_rows(&owners_in(&executor, "192.168.0.0/16")?);
    println!();

    println!("  B. select 'address, dns_name' transform 'ipaddress_to_device'");
    print_rows(&owners_by_address(&executor, "ipaddress_to_device")?);
    println!();

    println!("  C. transform 'ipaddress_to_device, remove_id'");
    print_rows(&owners_by_address(&executor, "ipaddress_to_device, remove_id")?);
    println!();

    println!("  D. where 'prefix=192.168.0.0/16 and pip4for_cf_net=testnet'");
    print_rows(&owners_on_net(&executor, "192.168.0.0/16", "testnet")?);
    println!();

    println!("  Scenario 4 complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{fixtures, lab_executor};

    #[test]
    fn test_owned_addresses_become_devices() {
        let executor = crate::executor().unwrap();
        let rows = owners_in(&executor, "192.168.0.0/16").unwrap();
        assert_eq!(
            rows,
            vec![
                json!({ "name": "lab.local", "serial": "FOC1111A1AA", "address": "192.168.0.1/24" }),
                json!({ "name": "switch.local", "serial": "FOC2222B2BB", "address": "192.168.0.2/24" }),
            ]
        );
    }

    #[test]
    fn test_owner_relation_added_when_missing() {
        let (executor, log) = lab_executor(fixtures::lab_registry().unwrap());
        let rows = owners_by_address(&executor, "ipaddress_to_device").unwrap();
        assert_eq!(
            rows[0],
            json!({ "id": "d-1", "name": "lab.local", "address": "192.168.0.1/24", "dns_name": "lab.local" })
        );
        assert_eq!(rows.len(), 2);
        assert!(log.lock().unwrap()[0]
            .selection
            .contains(&"primary_ip4_for".to_string()));
    }

    #[test]
    fn test_owner_custom_field_narrows_owners() {
        let (executor, log) = lab_executor(fixtures::lab_registry().unwrap());
        let rows = owners_on_net(&executor, "192.168.0.0/24", "testnet").unwrap();
        assert_eq!(
            rows,
            vec![json!({ "name": "lab.local", "serial": "FOC1111A1AA", "address": "192.168.0.1/24" })]
        );

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].relation_filters.len(), 1);
        assert_eq!(log[0].relation_filters[0].relation, "primary_ip4_for");
        assert_eq!(log[0].filter.comparisons().len(), 1);
    }

    #[test]
    fn test_owner_filter_keeps_unowned_addresses_without_transform() {
        let (executor, log) = lab_executor(fixtures::lab_registry().unwrap());
        let rows = executor
            .select("address")
            .using("nb.ipaddresses")
            .where_("pip4for_name=lab.local")
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], json!({ "address": "192.168.0.1/24" }));
        assert!(log.lock().unwrap()[0]
            .selection
            .contains(&"primary_ip4_for".to_string()));
    }

    #[test]
    fn test_owner_filter_renders_on_nested_selection() {
        let executor = crate::executor().unwrap();
        let queries = executor
            .select("address, primary_ip4_for.name")
            .using("nb.ipaddresses")
            .explain("prefix=192.168.0.0/24 and pip4for_cf_net=testnet")
            .unwrap();
        let q = &queries[0];
        assert!(q.query.contains("$pip4for_cf_net: [String]"), "{}", q.query);
        assert!(q.query.contains("ip_addresses (prefix: $prefix) {"), "{}", q.query);
        assert!(q.query.contains("primary_ip4_for (cf_net: $pip4for_cf_net) {"), "{}", q.query);
        assert_eq!(q.variables["pip4for_cf_net"], json!(["testnet"]));
    }

    #[test]
    fn test_owner_filter_mixed_with_address_filter_in_or_is_rejected() {
        let executor = crate::executor().unwrap();
        let err = executor
            .select("address")
            .using("nb.ipaddresses")
            .where_("pip4for_name=lab.local or dns_name=lab.local")
            .unwrap_err();
        assert!(matches!(err, veritas_contracts::error::VeritasError::ParseError { .. }));
    }

    #[test]
    fn test_remove_id_after_reroot() {
        let executor = crate::executor().unwrap();
        let rows = owners_by_address(&executor, "ipaddress_to_device, remove_id").unwrap();
        assert_eq!(
            rows[1],
            json!({ "name": "switch.local", "address": "192.168.0.2/24", "dns_name": "switch.local" })
        );
    }
}
