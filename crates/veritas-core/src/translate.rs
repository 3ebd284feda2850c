//! Rendering a `SotRequest` the way the source of truth's GraphQL API
//! expects it.
//!
//! The selection is first turned into a [`SelectionNode`] tree, which is
//! also what in-memory backends use to shape stored objects, so both see the
//! same response layout.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    filter::{Comparison, FilterValue, Operator, Predicate},
    projection::{CUSTOM_FIELD_DATA, CUSTOM_FIELD_SOURCE},
    request::SotRequest,
    schema::{CustomFieldType, EndpointSchema, FieldDef, FieldKind},
};
use veritas_query::filter::{condense, filter_target, WITHIN_INCLUDE};
use veritas_schema::SchemaRegistry;

/// Children selected for an open relation that is requested without a subpath.
const OPEN_RELATION_DEFAULTS: [&str; 2] = ["id", "name"];

// ── Selection tree ────────────────────────────────────────────────────────────

/// One field of a response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionNode {
    /// Key the field has in the response.
    pub name: String,
    /// Attribute the field is read from on the stored object.
    pub source: String,
    /// Sub-selection. Empty for leaves, which return the whole value.
    pub children: Vec<SelectionNode>,
}

impl SelectionNode {
    fn leaf(name: &str, source: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            children: Vec::new(),
        }
    }
}

fn node_for<'n>(nodes: &'n mut Vec<SelectionNode>, name: &str, def: Option<&FieldDef>) -> &'n mut SelectionNode {
    let pos = match nodes.iter().position(|n| n.name == name) {
        Some(pos) => pos,
        None => {
            let source = def.and_then(|d| d.source.as_deref()).unwrap_or(name);
            nodes.push(SelectionNode::leaf(name, source));
            nodes.len() - 1
        }
    };
    &mut nodes[pos]
}

/// Select every declared child of `def` below `node`.
fn expand(node: &mut SelectionNode, def: &FieldDef) {
    if def.is_open() {
        for name in OPEN_RELATION_DEFAULTS {
            node_for(&mut node.children, name, None);
        }
        return;
    }
    for child in &def.fields {
        let child_node = node_for(&mut node.children, &child.name, Some(child));
        if child.kind.is_nested() {
            expand(child_node, child);
        }
    }
}

fn insert_path(nodes: &mut Vec<SelectionNode>, segments: &[&str], defs: &[FieldDef]) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };
    let def = defs.iter().find(|f| f.name == *head);
    let node = node_for(nodes, head, def);
    match def {
        Some(def) if tail.is_empty() && def.kind.is_nested() => expand(node, def),
        Some(def) => insert_path(&mut node.children, tail, &def.fields),
        None => insert_path(&mut node.children, tail, &[]),
    }
}

/// Build the response shape for a list of dotted selection paths.
///
/// A relation selected without a subpath expands to its declared children.
/// `custom_field_data` always selects the whole custom-field bag.
pub fn selection_tree(selection: &[String], schema: &EndpointSchema) -> Vec<SelectionNode> {
    let mut roots = Vec::new();
    for path in selection {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.first() == Some(&CUSTOM_FIELD_DATA) {
            node_for(&mut roots, CUSTOM_FIELD_DATA, None).source = CUSTOM_FIELD_SOURCE.to_string();
            continue;
        }
        insert_path(&mut roots, &segments, &schema.fields);
    }
    roots
}

// ── GraphQL rendering ─────────────────────────────────────────────────────────

/// A GraphQL document and its variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlQuery {
    pub query: String,
    pub variables: Map<String, Value>,
}

fn translation_error(reason: impl Into<String>) -> VeritasError {
    VeritasError::Translation {
        reason: reason.into(),
    }
}

fn leaves<'p>(predicate: &'p Predicate, out: &mut Vec<&'p Comparison>) -> VeritasResult<()> {
    match predicate {
        Predicate::All => Ok(()),
        Predicate::Compare(c) => {
            out.push(c);
            Ok(())
        }
        Predicate::And(l, r) => {
            leaves(l, out)?;
            leaves(r, out)
        }
        Predicate::Or(..) => Err(translation_error(format!(
            "'{predicate}' combines different filters with 'or'; a single request can only express 'and'"
        ))),
    }
}

fn argument_name(c: &Comparison) -> String {
    if c.operator == Operator::WithinInclude && c.field == WITHIN_INCLUDE {
        WITHIN_INCLUDE.to_string()
    } else {
        format!("{}{}", c.field, c.operator.lookup_suffix())
    }
}

fn variable_value(c: &Comparison, var_type: &str) -> VeritasResult<Value> {
    match (var_type, &c.value) {
        (_, FilterValue::Bool(b)) => Ok(Value::Bool(*b)),
        ("String", FilterValue::Text(t)) => Ok(Value::String(t.clone())),
        ("String", FilterValue::List(_)) => Err(translation_error(format!(
            "text custom field '{}' takes a single value",
            c.field
        ))),
        ("[Int]", value) => value
            .texts()
            .iter()
            .map(|t| {
                t.trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| translation_error(format!("'{t}' is not an integer")))
            })
            .collect::<VeritasResult<Vec<_>>>()
            .map(Value::Array),
        (_, value) => Ok(Value::Array(value.texts().into_iter().map(Value::String).collect())),
    }
}

/// GraphQL arguments as `(argument, variable)` pairs.
type Arguments = Vec<(String, String)>;

fn format_arguments(args: &Arguments) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|(name, variable)| format!("{name}: ${variable}"))
        .collect();
    format!(" ({})", rendered.join(", "))
}

fn render_nodes(
    nodes: &[SelectionNode],
    depth: usize,
    nested: Option<&HashMap<&str, Arguments>>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        out.push_str(&indent);
        if node.name == node.source {
            out.push_str(&node.name);
        } else {
            out.push_str(&format!("{}: {}", node.name, node.source));
        }
        if let Some(args) = nested.and_then(|n| n.get(node.name.as_str())) {
            out.push_str(&format_arguments(args));
        }
        if node.children.is_empty() {
            out.push('\n');
        } else {
            out.push_str(" {\n");
            render_nodes(&node.children, depth + 1, None, out);
            out.push_str(&indent);
            out.push_str("}\n");
        }
    }
}

/// Declare a variable for every leaf of `predicate` and return the
/// arguments that pass them.
///
/// Variables are named after the filter as written. Arguments of a relation
/// filter drop the relation prefix: `pip4for_cf_net` is passed to the
/// relation as `cf_net: $pip4for_cf_net`.
fn add_arguments(
    predicate: Predicate,
    schema: &EndpointSchema,
    registry: &SchemaRegistry,
    declarations: &mut Vec<(String, &'static str)>,
    variables: &mut Map<String, Value>,
) -> VeritasResult<Arguments> {
    let predicate = condense(predicate, schema, registry);
    let mut comparisons = Vec::new();
    leaves(&predicate, &mut comparisons)?;

    let mut arguments = Arguments::new();
    for c in comparisons {
        let target = filter_target(&c.field, schema, registry)?;
        let var_type = match (target.custom, target.kind) {
            (Some(CustomFieldType::Text), _) => "String",
            (_, FieldKind::Boolean) => "Boolean",
            (_, FieldKind::Integer) => "[Int]",
            _ => "[String]",
        };
        let name = argument_name(c);
        let value = variable_value(c, var_type)?;

        match variables.get_mut(&name) {
            Some(Value::Array(existing)) => match value {
                Value::Array(more) => existing.extend(more),
                _ => return Err(translation_error(format!("filter '{name}' given twice"))),
            },
            Some(_) => return Err(translation_error(format!("filter '{name}' given twice"))),
            None => {
                let argument = match schema.relation_filter(&c.field) {
                    Some(def) if target.relation.is_some() => {
                        name.strip_prefix(def.prefix.as_str()).unwrap_or(name.as_str()).to_string()
                    }
                    _ => name.clone(),
                };
                arguments.push((argument, name.clone()));
                declarations.push((name.clone(), var_type));
                variables.insert(name, value);
            }
        }
    }
    Ok(arguments)
}

/// Render `request` as one GraphQL query.
///
/// The filter is condensed first; an `or` that survives condensing cannot be
/// sent as one request and fails with `Translation`. Repeated arguments merge
/// their values into one list. Relation filters become arguments of the
/// nested relation's selection.
pub fn render_graphql(
    request: &SotRequest,
    schema: &EndpointSchema,
    registry: &SchemaRegistry,
) -> VeritasResult<GraphqlQuery> {
    let mut declarations: Vec<(String, &'static str)> = Vec::new();
    let mut variables = Map::new();

    let mut root_arguments = add_arguments(
        request.filter.clone(),
        schema,
        registry,
        &mut declarations,
        &mut variables,
    )?;
    let mut nested: HashMap<&str, Arguments> = HashMap::new();
    for scoped in &request.relation_filters {
        let args = add_arguments(
            scoped.filter.clone(),
            schema,
            registry,
            &mut declarations,
            &mut variables,
        )?;
        nested.entry(scoped.relation.as_str()).or_default().extend(args);
    }

    if !request.root.is_empty() {
        for (name, value) in [("limit", request.limit), ("offset", request.offset)] {
            if let Some(n) = value {
                declarations.push((name.to_string(), "Int"));
                variables.insert(name.to_string(), Value::from(n));
                root_arguments.push((name.to_string(), name.to_string()));
            }
        }
    }

    let mut query = String::from("query");
    if !declarations.is_empty() {
        let decls: Vec<String> = declarations
            .iter()
            .map(|(name, ty)| format!("${name}: {ty}"))
            .collect();
        query.push_str(&format!(" ({})", decls.join(", ")));
    }
    query.push_str(" {\n");

    let nodes = selection_tree(&request.selection, schema);
    if request.root.is_empty() {
        render_nodes(&nodes, 1, Some(&nested), &mut query);
    } else {
        query.push_str("  ");
        query.push_str(&request.root);
        if !root_arguments.is_empty() {
            query.push_str(&format_arguments(&root_arguments));
        }
        query.push_str(" {\n");
        render_nodes(&nodes, 2, Some(&nested), &mut query);
        query.push_str("  }\n");
    }
    query.push('}');

    Ok(GraphqlQuery { query, variables })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use veritas_contracts::{
        error::VeritasError,
        request::SotRequest,
        schema::{CustomFieldDef, CustomFieldType},
    };
    use veritas_query::filter;
    use veritas_schema::SchemaRegistry;

    use super::{render_graphql, selection_tree};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin()
            .unwrap()
            .with_custom_field(CustomFieldDef::new("net", CustomFieldType::Select))
            .with_custom_field(CustomFieldDef::new("snmp_credentials", CustomFieldType::Text))
            .with_custom_field(CustomFieldDef::new("checkmk", CustomFieldType::Boolean))
    }

    fn request(endpoint: &str, selection: &[&str], expr: &str) -> (SotRequest, SchemaRegistry) {
        let registry = registry();
        let schema = registry.endpoint(endpoint).unwrap().clone();
        let mut request = SotRequest::new(endpoint, schema.root.clone());
        for path in selection {
            request.select(*path);
        }
        request.filter = filter::bind(filter::parse(expr).unwrap(), &schema, &registry).unwrap();
        (request, registry)
    }

    fn render(endpoint: &str, selection: &[&str], expr: &str) -> Result<super::GraphqlQuery, VeritasError> {
        let (request, registry) = request(endpoint, selection, expr);
        let schema = registry.endpoint(endpoint).unwrap().clone();
        render_graphql(&request, &schema, &registry)
    }

    #[test]
    fn test_render_devices_query() {
        let q = render("nb.devices", &["hostname", "platform.name"], "name__ic=local").unwrap();
        assert_eq!(
            q.query,
            "query ($name__ic: [String]) {\n  devices (name__ic: $name__ic) {\n    hostname: name\n    platform {\n      name\n    }\n  }\n}"
        );
        assert_eq!(q.variables["name__ic"], json!(["local"]));
    }

    #[test]
    fn test_render_bare_within_include() {
        let q = render("nb.prefixes", &["prefix"], "within_include=192.168.0.0/23").unwrap();
        assert!(q.query.contains("$within_include: [String]"), "{}", q.query);
        assert!(q.query.contains("prefixes (within_include: $within_include)"), "{}", q.query);
        assert_eq!(q.variables["within_include"], json!(["192.168.0.0/23"]));
    }

    #[test]
    fn test_render_variable_types() {
        let q = render(
            "nb.devices",
            &["hostname"],
            "cf_snmp_credentials=lab and cf_checkmk=true and cf_net=testnet",
        )
        .unwrap();
        assert!(q.query.contains("$cf_snmp_credentials: String"));
        assert!(q.query.contains("$cf_checkmk: Boolean"));
        assert!(q.query.contains("$cf_net: [String]"));
        assert_eq!(q.variables["cf_snmp_credentials"], json!("lab"));
        assert_eq!(q.variables["cf_checkmk"], json!(true));

        let q = render("nb.vlans", &["vid"], "vid=100 or vid=200").unwrap();
        assert!(q.query.contains("$vid: [Int]"));
        assert_eq!(q.variables["vid"], json!([100, 200]));
    }

    #[test]
    fn test_render_negation_and_repeated_arguments() {
        let q = render("nb.devices", &["hostname"], "name!=lab.local and platform=ios and platform=nxos").unwrap();
        assert_eq!(q.variables["name__n"], json!(["lab.local"]));
        assert_eq!(q.variables["platform"], json!(["ios", "nxos"]));
    }

    #[test]
    fn test_render_rejects_mixed_or() {
        let err = render("nb.devices", &["hostname"], "name=a or platform=ios").unwrap_err();
        assert!(matches!(err, VeritasError::Translation { .. }));
    }

    #[test]
    fn test_render_limit_offset_and_custom_fields() {
        let (mut request, registry) = request("nb.devices", &["hostname", "custom_field_data.net"], "");
        request.limit = Some(10);
        request.offset = Some(20);
        let schema = registry.endpoint("nb.devices").unwrap().clone();
        let q = render_graphql(&request, &schema, &registry).unwrap();
        assert!(q.query.starts_with("query ($limit: Int, $offset: Int) {"), "{}", q.query);
        assert!(q.query.contains("devices (limit: $limit, offset: $offset)"));
        assert!(q.query.contains("custom_field_data: _custom_field_data"));
        assert_eq!(q.variables["limit"], json!(10));
    }

    #[test]
    fn test_render_relation_filter_on_nested_selection() {
        let (mut request, registry) = request(
            "nb.ipaddresses",
            &["address", "primary_ip4_for.name"],
            "prefix=192.168.0.0/24 and pip4for_cf_net=eins",
        );
        let schema = registry.endpoint("nb.ipaddresses").unwrap().clone();
        let (own, scoped) = filter::split_relation_filters(request.filter.clone(), &schema, &registry).unwrap();
        request.filter = own;
        request.relation_filters = scoped;

        let q = render_graphql(&request, &schema, &registry).unwrap();
        assert_eq!(
            q.query,
            "query ($prefix: [String], $pip4for_cf_net: [String]) {\n  ip_addresses (prefix: $prefix) {\n    address\n    primary_ip4_for (cf_net: $pip4for_cf_net) {\n      name\n    }\n  }\n}"
        );
        assert_eq!(q.variables["prefix"], json!(["192.168.0.0/24"]));
        assert_eq!(q.variables["pip4for_cf_net"], json!(["eins"]));
    }

    #[test]
    fn test_render_boolean_relation_filter() {
        let (mut request, registry) = request("nb.devices", &["hostname", "interfaces.name"], "interfaces_enabled=true");
        let schema = registry.endpoint("nb.devices").unwrap().clone();
        let (own, scoped) = filter::split_relation_filters(request.filter.clone(), &schema, &registry).unwrap();
        request.filter = own;
        request.relation_filters = scoped;

        let q = render_graphql(&request, &schema, &registry).unwrap();
        assert!(q.query.contains("$interfaces_enabled: Boolean"), "{}", q.query);
        assert!(q.query.contains("  devices {\n"), "{}", q.query);
        assert!(q.query.contains("interfaces (enabled: $interfaces_enabled) {"), "{}", q.query);
        assert_eq!(q.variables["interfaces_enabled"], json!(true));
    }

    #[test]
    fn test_render_general_selects_top_level_roots() {
        let q = render("nb.general", &["platforms", "tags.name"], "").unwrap();
        assert_eq!(
            q.query,
            "query {\n  platforms {\n    id\n    name\n  }\n  tags {\n    name\n  }\n}"
        );
        assert!(q.variables.is_empty());
    }

    #[test]
    fn test_selection_tree_expands_relations() {
        let registry = registry();
        let devices = registry.endpoint("nb.devices").unwrap();
        let tree = selection_tree(&["platform".to_string(), "platform.name".to_string()], devices);
        let children: Vec<&str> = tree[0].children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(children, vec!["id", "name", "manufacturer"]);
        assert_eq!(tree[0].children[2].children[0].name, "name");

        let ips = registry.endpoint("nb.ipaddresses").unwrap();
        let tree = selection_tree(&["primary_ip4_for".to_string()], ips);
        let children: Vec<&str> = tree[0].children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(children, vec!["id", "name"]);
    }
}
