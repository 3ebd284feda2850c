//! Resolving a `QueryDescriptor` into executable requests.
//!
//! Resolution order is fixed: endpoint(s), projection, predicate, join,
//! transforms. Every step can fail, and every failure happens here, before
//! the executor issues a single request.

use tracing::{debug, warn};

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    filter::Predicate,
    join::JoinPlan,
    projection::ProjectionSpec,
    query::{QueryDescriptor, QueryId},
    request::SotRequest,
};
use veritas_query::{
    filter,
    join::{self, JoinSide},
    projection,
};
use veritas_schema::{EndpointHandle, SchemaRegistry};

use crate::traits::Transformer;

/// Transform that re-roots address records to their owning device.
pub const IPADDRESS_TO_DEVICE: &str = "ipaddress_to_device";

/// Relation from an address to the device that owns it.
pub const OWNER_RELATION: &str = "primary_ip4_for";

/// One endpoint's share of a query.
#[derive(Debug, Clone)]
pub struct SidePlan {
    pub endpoint: EndpointHandle,
    pub projection: ProjectionSpec,
    pub request: SotRequest,
}

#[derive(Debug, Clone)]
pub struct JoinStage {
    pub plan: JoinPlan,
    pub right: SidePlan,
    /// Output keys of a joined row, in selection order.
    pub order: Vec<(JoinSide, String)>,
}

/// A fully resolved query, ready to execute.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub id: QueryId,
    pub primary: SidePlan,
    pub join: Option<JoinStage>,
    pub transforms: Vec<String>,
}

impl QueryPlan {
    /// Every request the plan issues, primary first.
    pub fn requests(&self) -> Vec<(&EndpointHandle, &SotRequest)> {
        let mut out = vec![(&self.primary.endpoint, &self.primary.request)];
        if let Some(stage) = &self.join {
            out.push((&stage.right.endpoint, &stage.right.request));
        }
        out
    }
}

fn build_request(
    endpoint: &EndpointHandle,
    projection: &ProjectionSpec,
    filter: Predicate,
    registry: &SchemaRegistry,
) -> VeritasResult<SotRequest> {
    let schema = endpoint.schema();
    let mut request = SotRequest::new(endpoint.name.clone(), schema.root.clone());
    for field in &projection.fields {
        request.select(field.fetch_path());
    }

    let condensed = filter::condense(filter, schema, registry);
    let (own, relation_filters) = filter::split_relation_filters(condensed, schema, registry)?;
    // A relation filter narrows a list the response must contain.
    for scoped in &relation_filters {
        let selected = request
            .selection
            .iter()
            .any(|p| p.split('.').next() == Some(scoped.relation.as_str()));
        if !selected {
            request.select(scoped.relation.clone());
        }
    }
    request.filter = own;
    request.relation_filters = relation_filters;
    Ok(request)
}

/// Resolve `descriptor` against `registry`.
pub fn plan(
    descriptor: &QueryDescriptor,
    registry: &SchemaRegistry,
    transformer: &dyn Transformer,
) -> VeritasResult<QueryPlan> {
    let id = QueryId::new();

    // ── Step 1: endpoints ────────────────────────────────────────────────────
    let using = descriptor
        .using
        .as_deref()
        .ok_or_else(|| VeritasError::IncompleteQuery {
            reason: "no endpoint given; call using() before where()".to_string(),
        })?;
    let left = registry.resolve(using)?;

    let right = match (&descriptor.join, &descriptor.on) {
        (Some(table), Some(_)) => Some(registry.resolve(table)?),
        (Some(table), None) => {
            return Err(VeritasError::JoinResolution {
                reason: format!("join('{table}') needs an on() correlation"),
            })
        }
        (None, Some(on)) => {
            return Err(VeritasError::JoinResolution {
                reason: format!("on('{on}') given without join()"),
            })
        }
        (None, None) => None,
    };
    if let Some(right) = &right {
        if right.alias == left.alias {
            return Err(VeritasError::JoinResolution {
                reason: format!(
                    "both sides of the join use alias '{}'; name one with 'as'",
                    left.alias
                ),
            });
        }
    }

    if descriptor.select.is_empty() {
        return Err(VeritasError::IncompleteQuery {
            reason: "select() names no fields".to_string(),
        });
    }

    debug!(
        query_id = %id,
        endpoint = %left.name,
        join = ?right.as_ref().map(|r| r.name.as_str()),
        "endpoints resolved"
    );

    // ── Step 2: projection ───────────────────────────────────────────────────
    let (mut left_fields, right_fields) = match &right {
        Some(right) => join::split_fields(&descriptor.select, &left.alias, &right.alias),
        None => (descriptor.select.clone(), Vec::new()),
    };

    let wants_owner = descriptor.transforms.iter().any(|t| t == IPADDRESS_TO_DEVICE);
    let has_owner = left_fields
        .iter()
        .any(|f| f.split('.').next() == Some(OWNER_RELATION));
    if wants_owner && !has_owner && left.schema().field(OWNER_RELATION).is_some() {
        warn!(
            query_id = %id,
            endpoint = %left.name,
            "{IPADDRESS_TO_DEVICE} needs '{OWNER_RELATION}'; adding it to the selection"
        );
        left_fields.push(OWNER_RELATION.to_string());
    }

    let left_projection = projection::resolve(&left_fields, left.schema(), registry)?;
    let right_projection = match &right {
        Some(right) => Some(projection::resolve(&right_fields, right.schema(), registry)?),
        None => None,
    };

    // ── Step 3: predicate ────────────────────────────────────────────────────
    let parsed = filter::parse(descriptor.filter.as_deref().unwrap_or_default())?;
    let (left_filter, right_filter) = match &right {
        Some(right) => join::split_predicate(parsed, &left.alias, &right.alias)?,
        None => (parsed, Predicate::All),
    };
    let left_filter = filter::bind(left_filter, left.schema(), registry)?;
    let right_filter = match &right {
        Some(right) => filter::bind(right_filter, right.schema(), registry)?,
        None => Predicate::All,
    };

    // ── Step 4: join ─────────────────────────────────────────────────────────
    let join_plan = match (&right, &descriptor.on) {
        (Some(right), Some(on)) => Some(join::plan(&left, right, on)?),
        _ => None,
    };

    // ── Step 5: transforms ───────────────────────────────────────────────────
    transformer.validate(&descriptor.transforms)?;

    // ── Requests ─────────────────────────────────────────────────────────────
    let mut left_request = build_request(&left, &left_projection, left_filter, registry)?;
    left_request.limit = descriptor.limit;
    left_request.offset = descriptor.offset;

    let join = match (right, right_projection, join_plan) {
        (Some(right), Some(right_projection), Some(plan)) => {
            left_request.select(plan.left_key.fetch_path());
            let mut right_request = build_request(&right, &right_projection, right_filter, registry)?;
            right_request.select(plan.right_key.fetch_path());
            let order = join::output_order(&descriptor.select, &plan, &left_projection, &right_projection);
            Some(JoinStage {
                plan,
                order,
                right: SidePlan {
                    endpoint: right,
                    projection: right_projection,
                    request: right_request,
                },
            })
        }
        _ => None,
    };

    debug!(
        query_id = %id,
        filter = %left_request.filter,
        selection = ?left_request.selection,
        transforms = ?descriptor.transforms,
        "query planned"
    );

    Ok(QueryPlan {
        id,
        primary: SidePlan {
            endpoint: left,
            projection: left_projection,
            request: left_request,
        },
        join,
        transforms: descriptor.transforms.clone(),
    })
}
