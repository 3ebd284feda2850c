//! Scenario 1: Inventory Query
//!
//! Device inventory lookups on `nb.devices`:
//!
//! Sub-case A: case-insensitive hostname search
//! Sub-case B: custom fields in the selection and in the filter
//! Sub-case C: an `or` over one filter, condensed into a single request
//! Sub-case D: paging with limit and offset

use serde_json::Value;

use veritas_contracts::error::VeritasResult;
use veritas_core::Executor;

use crate::print_rows;

/// Hostnames containing `needle`, case-insensitively.
pub fn hostnames_like(executor: &Executor, needle: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select("hostname")
        .using("nb.devices")
        .where_(&format!("name__ic={needle}"))
}

/// Devices on `net`, with their platform and custom field values.
pub fn devices_on_net(executor: &Executor, net: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select("hostname, platform.name, cf_net, cf_checkmk")
        .using("nb.devices")
        .where_(&format!("cf_net={net}"))
}

/// Devices at either location, as one request.
pub fn devices_at(executor: &Executor, first: &str, second: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select("hostname, location.name")
        .using("nb.devices")
        .where_(&format!("location={first} or location={second}"))
}

/// One page of hostnames.
pub fn page(executor: &Executor, limit: usize, offset: usize) -> VeritasResult<Vec<Value>> {
    executor
        .select("hostname")
        .using("nb.devices")
        .limit(limit)
        .offset(offset)
        .all()
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 1: Inventory Query.
pub fn run_scenario() -> VeritasResult<()> {
    println!("=== Scenario 1: Inventory Query ===");
    println!();

    let executor = crate::executor()?;

    println!("  A. select 'hostname' using 'nb.devices' where 'name__ic=local'");
    print_rows(&hostnames_like(&executor, "local")?);
    println!();

    println!("  B. select 'hostname, platform.name, cf_net, cf_checkmk' where 'cf_net=testnet'");
    print_rows(&devices_on_net(&executor, "testnet")?);
    println!();

    println!("  C. where 'location=site_1 or location=default-site' (sent as one request)");
    print_rows(&devices_at(&executor, "site_1", "default-site")?);
    println!();

    println!("  D. limit 2, offset 1");
    print_rows(&page(&executor, 2, 1)?);
    println!();

    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
