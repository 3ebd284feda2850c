//! The veritas executor: plan, fetch, combine, transform.
//!
//! The executor enforces the query pipeline:
//!
//!   Endpoint → Projection → Predicate → Join → Transforms → [SotBackend::fetch] → Combine → Transform
//!
//! Planning is complete before the first fetch: a query that cannot be
//! resolved never reaches the source of truth.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use veritas_contracts::{
    error::VeritasResult,
    query::{NameList, QueryDescriptor, QueryId},
    request::{Record, SotRequest},
};
use veritas_query::{join, projection};
use veritas_schema::SchemaRegistry;

use crate::planner::{self, QueryPlan};
use crate::selection::Selection;
use crate::traits::{SotBackend, Transformer};
use crate::translate::{render_graphql, GraphqlQuery};

/// Runs queries against one source of truth.
///
/// The executor holds no per-query state; one instance can serve any number
/// of query chains, including from several threads.
pub struct Executor {
    registry: Arc<SchemaRegistry>,
    backend: Box<dyn SotBackend>,
    transformer: Box<dyn Transformer>,
}

impl Executor {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        backend: Box<dyn SotBackend>,
        transformer: Box<dyn Transformer>,
    ) -> Self {
        Self {
            registry,
            backend,
            transformer,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Start a query chain selecting `fields`.
    pub fn select(&self, fields: impl Into<NameList>) -> Selection<'_> {
        Selection::new(self, fields.into())
    }

    /// Resolve `descriptor` without running it.
    pub fn plan(&self, descriptor: &QueryDescriptor) -> VeritasResult<QueryPlan> {
        planner::plan(descriptor, &self.registry, self.transformer.as_ref())
    }

    /// Execute a query.
    ///
    /// # Pipeline
    ///
    /// 1. Plan: resolve endpoints, projection, predicate, join, and transform
    ///    names. Any failure returns here with no request issued.
    /// 2. Fetch the primary endpoint, then the joined endpoint if any.
    /// 3. Shape records to the projection, or inner-join the two sides.
    /// 4. Apply the transform pipeline in order.
    ///
    /// # Errors
    ///
    /// Build-time errors from step 1; `VeritasError::Transport` from the
    /// backend, unchanged; transform failures from step 4.
    pub fn execute(&self, descriptor: &QueryDescriptor) -> VeritasResult<Vec<Value>> {
        let plan = self.plan(descriptor)?;
        let id = &plan.id;

        info!(
            query_id = %id,
            endpoint = %plan.primary.endpoint.name,
            join = ?plan.join.as_ref().map(|j| j.right.endpoint.name.as_str()),
            "executing query"
        );

        // ── Step 2: fetch ────────────────────────────────────────────────────
        let left = self.fetch(id, &plan.primary.request)?;

        // ── Step 3: shape / combine ──────────────────────────────────────────
        let rows: Vec<Record> = match &plan.join {
            Some(stage) => {
                let right = self.fetch(id, &stage.right.request)?;
                join::combine(
                    &left,
                    &right,
                    &stage.plan,
                    &stage.order,
                    &plan.primary.projection,
                    &stage.right.projection,
                )
            }
            None => left
                .iter()
                .map(|r| projection::project(r, &plan.primary.projection))
                .collect(),
        };

        // ── Step 4: transforms ───────────────────────────────────────────────
        let values: Vec<Value> = rows.into_iter().map(Value::Object).collect();
        let output = self.transformer.apply(&plan.transforms, values)?;

        info!(query_id = %id, records = output.len(), "query complete");
        Ok(output)
    }

    /// Render the GraphQL requests `descriptor` would issue.
    pub fn explain(&self, descriptor: &QueryDescriptor) -> VeritasResult<Vec<GraphqlQuery>> {
        let plan = self.plan(descriptor)?;
        plan.requests()
            .into_iter()
            .map(|(endpoint, request)| render_graphql(request, endpoint.schema(), &self.registry))
            .collect()
    }

    fn fetch(&self, id: &QueryId, request: &SotRequest) -> VeritasResult<Vec<Record>> {
        debug!(
            query_id = %id,
            endpoint = %request.endpoint,
            filter = %request.filter,
            "fetching"
        );
        match self.backend.fetch(request) {
            Ok(records) => {
                debug!(query_id = %id, endpoint = %request.endpoint, records = records.len(), "fetched");
                Ok(records)
            }
            Err(e) => {
                warn!(query_id = %id, endpoint = %request.endpoint, error = %e, "fetch failed");
                Err(e)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use veritas_contracts::{
        error::{VeritasError, VeritasResult},
        filter::{FilterValue, Predicate},
        query::QueryDescriptor,
        request::{Record, SotRequest},
        schema::{CustomFieldDef, CustomFieldType},
    };
    use veritas_schema::SchemaRegistry;

    use super::Executor;
    use crate::traits::{SotBackend, Transformer};

    // ── Mock implementations ──────────────────────────────────────────────────

    /// A backend that returns canned records per endpoint and records every
    /// request it receives.
    struct MockBackend {
        tables: HashMap<String, Vec<Record>>,
        requests: Arc<Mutex<Vec<SotRequest>>>,
        /// When set, every fetch fails with this transport detail.
        failure: Option<String>,
    }

    impl SotBackend for MockBackend {
        fn fetch(&self, request: &SotRequest) -> VeritasResult<Vec<Record>> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(reason) = &self.failure {
                return Err(VeritasError::Transport {
                    reason: reason.clone(),
                });
            }
            Ok(self.tables.get(&request.endpoint).cloned().unwrap_or_default())
        }
    }

    /// A transformer that knows `remove_id` and `ipaddress_to_device` and
    /// records which names it applied.
    struct MockTransformer {
        applied: Arc<Mutex<Vec<String>>>,
    }

    impl Transformer for MockTransformer {
        fn validate(&self, names: &[String]) -> VeritasResult<()> {
            match names
                .iter()
                .find(|n| !["remove_id", "ipaddress_to_device"].contains(&n.as_str()))
            {
                Some(name) => Err(VeritasError::UnknownTransform { name: name.clone() }),
                None => Ok(()),
            }
        }

        fn apply(&self, names: &[String], records: Vec<Value>) -> VeritasResult<Vec<Value>> {
            self.applied.lock().unwrap().extend(names.iter().cloned());
            Ok(records)
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    struct Harness {
        executor: Executor,
        requests: Arc<Mutex<Vec<SotRequest>>>,
        applied: Arc<Mutex<Vec<String>>>,
    }

    fn harness(failure: Option<&str>) -> Harness {
        let registry = SchemaRegistry::builtin()
            .unwrap()
            .with_custom_field(CustomFieldDef::new("net", CustomFieldType::Select));

        let mut tables = HashMap::new();
        tables.insert(
            "nb.devices".to_string(),
            vec![
                record(json!({
                    "id": "d-1",
                    "hostname": "lab.local",
                    "platform": { "name": "ios" },
                    "custom_field_data": { "net": "testnet" }
                })),
                record(json!({
                    "id": "d-2",
                    "hostname": "switch.local",
                    "platform": { "name": "ios" },
                    "custom_field_data": { "net": "prodnet" }
                })),
            ],
        );
        tables.insert(
            "nb.vlans".to_string(),
            vec![record(json!({
                "vid": 100,
                "interfaces_as_tagged": [{ "device": { "id": "d-2" } }]
            }))],
        );

        let requests = Arc::new(Mutex::new(Vec::new()));
        let applied = Arc::new(Mutex::new(Vec::new()));
        let backend = MockBackend {
            tables,
            requests: Arc::clone(&requests),
            failure: failure.map(str::to_string),
        };
        let transformer = MockTransformer {
            applied: Arc::clone(&applied),
        };
        Harness {
            executor: Executor::new(Arc::new(registry), Box::new(backend), Box::new(transformer)),
            requests,
            applied,
        }
    }

    // ── 1. happy path ─────────────────────────────────────────────────────────

    #[test]
    fn test_execute_projects_selected_keys_in_order() {
        let h = harness(None);
        let rows = h
            .executor
            .select("cf_net, hostname")
            .using("nb.devices")
            .all()
            .unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            let keys: Vec<&str> = row.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["custom_field_data", "hostname"]);
        }
        assert_eq!(rows[0]["custom_field_data"], json!({ "net": "testnet" }));
        assert_eq!(h.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_request_carries_selection_condensed_filter_and_paging() {
        let h = harness(None);
        h.executor
            .select("hostname, platform.name, cf_net")
            .using("nb.devices")
            .limit(5)
            .offset(10)
            .where_("name=lab.local or name=switch.local")
            .unwrap();

        let requests = h.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.root, "devices");
        assert_eq!(
            request.selection,
            vec!["hostname", "platform.name", "custom_field_data.net"]
        );
        assert_eq!(request.limit, Some(5));
        assert_eq!(request.offset, Some(10));
        match &request.filter {
            Predicate::Compare(c) => assert_eq!(
                c.value,
                FilterValue::List(vec!["lab.local".into(), "switch.local".into()])
            ),
            other => panic!("expected condensed leaf, got {other:?}"),
        }
    }

    #[test]
    fn test_transforms_applied_in_order() {
        let h = harness(None);
        h.executor
            .select("hostname")
            .using("nb.devices")
            .transform("remove_id")
            .transform(vec!["remove_id", "remove_id"])
            .all()
            .unwrap();
        assert_eq!(h.applied.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_join_issues_one_request_per_side() {
        let h = harness(None);
        let rows = h
            .executor
            .select("v.vid, d.hostname")
            .using("nb.vlans as v")
            .join("nb.devices as d")
            .on("v.interfaces_as_tagged[0].device.id = d.id")
            .limit(1)
            .all()
            .unwrap();

        assert_eq!(rows, vec![json!({ "vid": 100, "hostname": "switch.local" })]);

        let requests = h.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].endpoint, "nb.vlans");
        assert_eq!(requests[0].limit, Some(1));
        assert!(requests[0]
            .selection
            .contains(&"interfaces_as_tagged.device.id".to_string()));
        assert_eq!(requests[1].endpoint, "nb.devices");
        assert_eq!(requests[1].limit, None);
        assert!(requests[1].selection.contains(&"id".to_string()));
    }

    #[test]
    fn test_owner_relation_added_for_ipaddress_to_device() {
        let h = harness(None);
        h.executor
            .select("address")
            .using("nb.ipaddresses")
            .transform("ipaddress_to_device")
            .all()
            .unwrap();
        let requests = h.requests.lock().unwrap();
        assert_eq!(requests[0].selection, vec!["address", "primary_ip4_for"]);
    }

    // ── 2. build-time failures issue no request ───────────────────────────────

    fn assert_no_request(h: &Harness) {
        assert!(h.requests.lock().unwrap().is_empty(), "a request was issued");
    }

    #[test]
    fn test_unregistered_join_alias_fails_before_fetch() {
        let h = harness(None);
        let err = h
            .executor
            .select("v.vid, d.hostname")
            .using("nb.vlans as v")
            .join("nb.devices as d")
            .on("x.interfaces_as_tagged[0].device.id = d.id")
            .all()
            .unwrap_err();
        assert!(matches!(err, VeritasError::JoinResolution { .. }));
        assert_no_request(&h);
    }

    #[test]
    fn test_unknown_transform_fails_before_fetch() {
        let h = harness(None);
        let err = h
            .executor
            .select("hostname")
            .using("nb.devices")
            .transform("to_excel")
            .all()
            .unwrap_err();
        assert!(matches!(err, VeritasError::UnknownTransform { ref name } if name == "to_excel"));
        assert_no_request(&h);
        assert!(h.applied.lock().unwrap().is_empty());
    }

    #[test]
    fn test_build_errors_fail_before_fetch() {
        let h = harness(None);
        let cases: Vec<(QueryDescriptor, fn(&VeritasError) -> bool)> = vec![
            (
                QueryDescriptor::new("hostname").with_using("nb.racks"),
                |e| matches!(e, VeritasError::UnknownEndpoint { .. }),
            ),
            (
                QueryDescriptor::new("colour").with_using("nb.devices"),
                |e| matches!(e, VeritasError::UnknownField { .. }),
            ),
            (
                QueryDescriptor::new("hostname")
                    .with_using("nb.devices")
                    .with_filter("name=\"unterminated"),
                |e| matches!(e, VeritasError::ParseError { .. }),
            ),
            (
                QueryDescriptor::new("hostname"),
                |e| matches!(e, VeritasError::IncompleteQuery { .. }),
            ),
            (
                QueryDescriptor::new("").with_using("nb.devices"),
                |e| matches!(e, VeritasError::IncompleteQuery { .. }),
            ),
            (
                QueryDescriptor::new("hostname")
                    .with_using("nb.vlans as v")
                    .with_join("nb.devices as d"),
                |e| matches!(e, VeritasError::JoinResolution { .. }),
            ),
            (
                QueryDescriptor::new("hostname")
                    .with_using("nb.devices")
                    .with_on("a.id = b.id"),
                |e| matches!(e, VeritasError::JoinResolution { .. }),
            ),
        ];

        for (descriptor, expected) in cases {
            let err = h.executor.execute(&descriptor).unwrap_err();
            assert!(expected(&err), "unexpected error {err:?} for {descriptor:?}");
            assert!(err.is_build_time());
        }
        assert_no_request(&h);
    }

    // ── 3. transport failures ─────────────────────────────────────────────────

    #[test]
    fn test_transport_error_propagates_with_detail() {
        let h = harness(Some("HTTP 502 from https://sot.example/graphql/"));
        let err = h
            .executor
            .select("hostname")
            .using("nb.devices")
            .all()
            .unwrap_err();
        match err {
            VeritasError::Transport { reason } => assert!(reason.contains("HTTP 502")),
            other => panic!("expected Transport, got {other:?}"),
        }
        assert_eq!(h.requests.lock().unwrap().len(), 1);
        assert!(h.applied.lock().unwrap().is_empty());
    }

    // ── 4. explain ────────────────────────────────────────────────────────────

    #[test]
    fn test_explain_renders_without_fetching() {
        let h = harness(None);
        let queries = h
            .executor
            .select("hostname")
            .using("nb.devices")
            .explain("name__ic=local")
            .unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].query.contains("devices (name__ic: $name__ic)"));
        assert_no_request(&h);
    }
}
