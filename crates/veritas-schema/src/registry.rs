//! TOML-driven endpoint schema registry.
//!
//! `SchemaRegistry` loads a `SchemaConfig` from a TOML string or file and
//! answers the two questions every query asks before it runs: which endpoint
//! does a `using(...)` name refer to, and which custom fields exist.
//!
//! The registry is read-only once built. Hand it out behind an `Arc` and read
//! it from as many query chains as needed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    schema::{CustomFieldDef, EndpointSchema},
};

use crate::endpoint::{EndpointHandle, EndpointName};

/// The schema document shipped with the crate.
const BUILTIN_SCHEMA: &str = include_str!("../schema/nautobot.toml");

/// The top-level structure deserialized from a schema TOML document.
///
/// Example:
/// ```toml
/// [[endpoints]]
/// name = "nb.devices"
/// root = "devices"
/// custom_fields = true
///
/// [[endpoints.fields]]
/// name = "hostname"
/// source = "name"
///
/// [[custom_fields]]
/// name = "net"
/// type = "select"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub endpoints: Vec<EndpointSchema>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
}

/// Process-wide, read-only map from logical table name to endpoint schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    endpoints: BTreeMap<String, Arc<EndpointSchema>>,
    custom_fields: BTreeMap<String, CustomFieldDef>,
}

impl SchemaRegistry {
    /// Build a registry from an already-deserialized config.
    ///
    /// Later endpoints with the same name replace earlier ones.
    pub fn from_config(config: SchemaConfig) -> Self {
        let mut registry = Self::default();
        for endpoint in config.endpoints {
            if registry.endpoints.contains_key(&endpoint.name) {
                warn!(endpoint = %endpoint.name, "duplicate endpoint definition replaces earlier one");
            }
            registry
                .endpoints
                .insert(endpoint.name.clone(), Arc::new(endpoint));
        }
        for cf in config.custom_fields {
            registry.register_custom_field(cf);
        }
        registry
    }

    /// Parse `s` as TOML and build a registry.
    ///
    /// Returns `VeritasError::ConfigError` if the TOML is malformed or does
    /// not match the expected `SchemaConfig` layout.
    pub fn from_toml_str(s: &str) -> VeritasResult<Self> {
        let config: SchemaConfig = toml::from_str(s).map_err(|e| VeritasError::ConfigError {
            reason: format!("failed to parse schema TOML: {}", e),
        })?;
        debug!(
            endpoints = config.endpoints.len(),
            custom_fields = config.custom_fields.len(),
            "schema document loaded"
        );
        Ok(Self::from_config(config))
    }

    /// Read the file at `path` and parse it as a schema document.
    pub fn from_file(path: &Path) -> VeritasResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| VeritasError::ConfigError {
            reason: format!("failed to read schema file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The built-in nautobot schema (`nb.devices`, `nb.prefixes`,
    /// `nb.ipaddresses`, `nb.vlans`, `nb.general`) without custom fields.
    pub fn builtin() -> VeritasResult<Self> {
        Self::from_toml_str(BUILTIN_SCHEMA)
    }

    /// Declare a custom field. Registering the same name twice replaces the
    /// previous definition.
    pub fn register_custom_field(&mut self, def: CustomFieldDef) {
        self.custom_fields.insert(def.name.clone(), def);
    }

    pub fn with_custom_field(mut self, def: CustomFieldDef) -> Self {
        self.register_custom_field(def);
        self
    }

    pub fn endpoint(&self, name: &str) -> Option<&Arc<EndpointSchema>> {
        self.endpoints.get(name)
    }

    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomFieldDef> {
        self.custom_fields.get(name)
    }

    /// Resolve a `using(...)` / `join(...)` argument to an endpoint handle.
    ///
    /// The argument has the form `namespace.table[ as alias]`. Without an
    /// alias the bare table name is used (`nb.devices` -> `devices`).
    /// Unregistered tables fail with `VeritasError::UnknownEndpoint`.
    pub fn resolve(&self, spec: &str) -> VeritasResult<EndpointHandle> {
        let name = EndpointName::parse(spec)?;
        let schema = self
            .endpoints
            .get(&name.table)
            .ok_or_else(|| VeritasError::UnknownEndpoint {
                name: name.table.clone(),
            })?;

        debug!(endpoint = %name.table, alias = %name.alias, "endpoint resolved");

        Ok(EndpointHandle {
            name: name.table,
            alias: name.alias,
            schema: Arc::clone(schema),
        })
    }
}
