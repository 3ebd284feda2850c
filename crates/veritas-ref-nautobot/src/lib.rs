//! # veritas-ref-nautobot
//!
//! Reference runtime for the veritas query layer, backed by a fictional
//! nautobot lab instead of a live server.
//!
//! Demonstrates four query scenarios against fixture inventory:
//!
//! 1. **Inventory query**: case-insensitive name search, custom fields,
//!    condensed `or` filters and paging on `nb.devices`.
//! 2. **Prefix lookup**: `within_include` on `nb.prefixes`, with the
//!    GraphQL request the query would send to nautobot.
//! 3. **VLAN join**: devices joined to the VLANs tagged on their interfaces.
//! 4. **Address owner**: IP addresses re-rooted to the device that uses them
//!    as primary IPv4 address.
//!
//! All data is hardcoded. No network calls are made.

use std::sync::Arc;

use serde_json::Value;

use veritas_contracts::error::VeritasResult;
use veritas_core::Executor;
use veritas_schema::SchemaRegistry;
use veritas_transform::TransformPipeline;

pub mod backend;
pub mod fixtures;
pub mod scenarios;

pub use backend::{InMemoryBackend, RequestLog};

/// An executor over the lab fixtures with `registry` as schema, plus a
/// handle on the log of requests its backend receives.
pub fn lab_executor(registry: SchemaRegistry) -> (Executor, RequestLog) {
    let registry = Arc::new(registry);
    let backend = InMemoryBackend::new(Arc::clone(&registry), fixtures::tables());
    let log = backend.request_log();
    let executor = Executor::new(registry, Box::new(backend), Box::new(TransformPipeline::new()));
    (executor, log)
}

/// An executor over the lab fixtures with the lab's custom fields registered.
pub fn executor() -> VeritasResult<Executor> {
    let (executor, _) = lab_executor(fixtures::lab_registry()?);
    Ok(executor)
}

pub(crate) fn print_rows(rows: &[Value]) {
    if rows.is_empty() {
        println!("    (no records)");
    }
    for row in rows {
        println!("    {row}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use veritas_contracts::error::VeritasError;

    use veritas_core::Executor;

    use crate::{fixtures, lab_executor, RequestLog};

    fn lab() -> (Executor, RequestLog) {
        lab_executor(fixtures::lab_registry().unwrap())
    }

    // ── 1. end-to-end ─────────────────────────────────────────────────────────

    #[test]
    fn test_hostname_icontains() {
        let (executor, _) = lab();
        let rows = executor
            .select("hostname")
            .using("nb.devices")
            .where_("name__ic=local")
            .unwrap();
        assert_eq!(rows, vec![json!({ "hostname": "lab.local" }), json!({ "hostname": "switch.local" })]);
    }

    #[test]
    fn test_empty_filter_returns_every_record() {
        let (executor, _) = lab();
        let tables = fixtures::tables();
        for (endpoint, field) in [
            ("nb.devices", "id"),
            ("nb.ipaddresses", "id"),
            ("nb.prefixes", "id"),
            ("nb.vlans", "id"),
            ("nb.general", "locations"),
        ] {
            let rows = executor.select(field).using(endpoint).all().unwrap();
            assert_eq!(rows.len(), tables[endpoint].len(), "{endpoint}");
        }
    }

    #[test]
    fn test_within_include_prefixes() {
        let (executor, _) = lab();
        let rows = executor
            .select("prefix,prefix_length,namespace")
            .using("nb.prefixes")
            .where_("within_include=192.168.0.0/23")
            .unwrap();
        assert_eq!(
            rows,
            vec![json!({
                "prefix": "192.168.0.0/24",
                "prefix_length": 24,
                "namespace": { "id": "ns-1", "name": "Global" }
            })]
        );
    }

    #[test]
    fn test_boolean_custom_field_filter() {
        let (executor, _) = lab();
        let rows = executor
            .select("hostname, cf_checkmk")
            .using("nb.devices")
            .where_("cf_checkmk=True")
            .unwrap();
        assert_eq!(
            rows,
            vec![json!({ "hostname": "lab.local", "custom_field_data": { "checkmk": true } })]
        );
    }

    #[test]
    fn test_tag_filter_looks_through_lists() {
        let (executor, _) = lab();
        let rows = executor
            .select("prefix")
            .using("nb.prefixes")
            .where_("tag=aggregate")
            .unwrap();
        assert_eq!(rows, vec![json!({ "prefix": "10.0.0.0/8" })]);
    }

    // ── 2. build-time failures issue no request ───────────────────────────────

    #[test]
    fn test_build_errors_never_reach_backend() {
        let (executor, log) = lab();
        let failures = [
            executor.select("hostname").using("nb.devices").where_("name__ic=local and"),
            executor.select("nonexistent").using("nb.devices").all(),
            executor.select("hostname").using("nb.routers").all(),
            executor.select("hostname").using("nb.devices").transform("to_excel").all(),
            executor.select("hostname").where_("name=lab.local"),
            executor
                .select("hostname")
                .using("nb.devices as d")
                .join("nb.vlans as v")
                .on("d.id = x.interfaces_as_tagged[0].device.id")
                .all(),
            executor.select("prefix").using("nb.prefixes").where_("prefix_length__ic=2"),
        ];
        for result in failures {
            let err = result.unwrap_err();
            assert!(err.is_build_time(), "{err} should be a build-time error");
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_custom_field() {
        let (executor, log) = lab();
        let err = executor
            .select("hostname")
            .using("nb.devices")
            .where_("cf_owner=ops")
            .unwrap_err();
        assert!(matches!(err, VeritasError::UnknownField { ref field, .. } if field == "cf_owner"));
        assert!(log.lock().unwrap().is_empty());
    }

    // ── 3. explain ────────────────────────────────────────────────────────────

    #[test]
    fn test_explain_issues_no_request() {
        let (executor, log) = lab();
        let queries = executor
            .select("hostname")
            .using("nb.devices")
            .explain("name__ic=local")
            .unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].query.contains("devices (name__ic: $name__ic)"));
        assert_eq!(queries[0].variables["name__ic"], json!(["local"]));
        assert!(log.lock().unwrap().is_empty());
    }
}
