//! Scenario 2: Prefix Lookup
//!
//! IPAM queries on `nb.prefixes`:
//!
//! Sub-case A: prefixes within (or equal to) a supernet, via `within_include`
//! Sub-case B: the GraphQL request sub-case A sends to nautobot
//! Sub-case C: a flat table without ids, via `remove_id` and `to_pandas`

use serde_json::Value;

use veritas_contracts::error::VeritasResult;
use veritas_core::{Executor, GraphqlQuery};

use crate::print_rows;

const FIELDS: &str = "prefix,prefix_length,namespace";

/// Prefixes inside `supernet`, the supernet itself included.
pub fn prefixes_within(executor: &Executor, supernet: &str) -> VeritasResult<Vec<Value>> {
    executor
        .select(FIELDS)
        .using("nb.prefixes")
        .where_(&format!("within_include={supernet}"))
}

/// The request `prefixes_within` would issue.
pub fn explain_within(executor: &Executor, supernet: &str) -> VeritasResult<Vec<GraphqlQuery>> {
    executor
        .select(FIELDS)
        .using("nb.prefixes")
        .explain(&format!("within_include={supernet}"))
}

/// Prefixes of one length as flat rows with dotted column names.
pub fn prefix_table(executor: &Executor, length: u8) -> VeritasResult<Vec<Value>> {
    executor
        .select("prefix, namespace.name, vlan, location.name")
        .using("nb.prefixes")
        .transform(["remove_id", "to_pandas"])
        .where_(&format!("prefix_length={length}"))
}

// ── Scenario runner ───────────────────────────────────────────────────────────

/// Run Scenario 2: Prefix Lookup.
pub fn run_scenario() -> VeritasResult<()> {
    println!("=== Scenario 2: Prefix Lookup ===");
    println!();

    let executor = crate::executor()?;

    println!("  A. select '{FIELDS}' using 'nb.prefixes' where 'within_include=192.168.0.0/23'");
    print_rows(&prefixes_within(&executor, "192.168.0.0/23")?);
    println!();

    println!("  B. GraphQL request for A:");
    for query in explain_within(&executor, "192.168.0.0/23")? {
        for line in query.query.lines() {
            println!("    {line}");
        }
        println!("    variables: {}", Value::Object(query.variables));
    }
    println!();

    println!("  C. /24 prefixes, transform 'remove_id, to_pandas'");
    print_rows(&prefix_table(&executor, 24)?);
    println!();

    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
