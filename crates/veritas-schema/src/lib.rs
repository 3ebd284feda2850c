//! # veritas-schema
//!
//! Endpoint schemas, custom-field declarations, and application config for
//! the veritas query layer.
//!
//! ## Overview
//!
//! [`SchemaRegistry`] maps logical table names (`nb.devices`, `nb.prefixes`,
//! ...) to the fields and filters each endpoint supports. A built-in schema
//! for nautobot ships with the crate; alternative documents can be loaded
//! from TOML. Custom fields are site-specific and are registered separately,
//! usually from [`SotConfig`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use veritas_schema::{ConfigLocator, SchemaRegistry};
//!
//! let config = ConfigLocator::new("inventory", ".").load()?;
//! let registry = config.registry()?;
//! let devices = registry.resolve("nb.devices as d")?;
//! ```

pub mod config;
pub mod endpoint;
pub mod registry;

pub use config::{ConfigLocator, LoggingConfig, NautobotConfig, SchemaSource, SotConfig};
pub use endpoint::{EndpointHandle, EndpointName};
pub use registry::{SchemaConfig, SchemaRegistry};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;

    use veritas_contracts::{
        error::VeritasError,
        schema::{CustomFieldDef, CustomFieldType, FieldKind, FilterLookup},
    };

    use crate::{ConfigLocator, EndpointName, SchemaRegistry, SotConfig};

    // ── 1. built-in schema ────────────────────────────────────────────────────

    #[test]
    fn test_builtin_schema_registers_all_endpoints() {
        let registry = SchemaRegistry::builtin().unwrap();
        let names: Vec<&str> = registry.endpoint_names().collect();
        assert_eq!(
            names,
            vec!["nb.devices", "nb.general", "nb.ipaddresses", "nb.prefixes", "nb.vlans"]
        );
    }

    #[test]
    fn test_builtin_devices_shape() {
        let registry = SchemaRegistry::builtin().unwrap();
        let devices = registry.endpoint("nb.devices").unwrap();

        assert_eq!(devices.root, "devices");
        assert!(devices.custom_fields);
        assert_eq!(devices.field("hostname").unwrap().source.as_deref(), Some("name"));

        let platform = devices.field("platform").unwrap();
        assert_eq!(platform.kind, FieldKind::Relation);
        assert!(platform.child("name").is_some());

        let location = devices.filter("location").unwrap();
        assert_eq!(location.record_path(), "location.name");
    }

    #[test]
    fn test_builtin_prefix_filters() {
        let registry = SchemaRegistry::builtin().unwrap();
        let prefixes = registry.endpoint("nb.prefixes").unwrap();

        let within = prefixes.filter("within_include").unwrap();
        assert_eq!(within.kind, FieldKind::Prefix);
        assert_eq!(within.lookup, FilterLookup::Within);
        assert_eq!(within.record_path(), "prefix");

        assert_eq!(prefixes.field("prefix_length").unwrap().kind, FieldKind::Integer);
    }

    #[test]
    fn test_primary_ip4_for_is_open() {
        let registry = SchemaRegistry::builtin().unwrap();
        let ips = registry.endpoint("nb.ipaddresses").unwrap();
        assert!(ips.field("primary_ip4_for").unwrap().is_open());
        assert!(!ips.field("interfaces").unwrap().is_open());
    }

    #[test]
    fn test_builtin_relation_filters() {
        let registry = SchemaRegistry::builtin().unwrap();
        let ips = registry.endpoint("nb.ipaddresses").unwrap();

        let owner = ips.relation_filter("pip4for_cf_net").unwrap();
        assert_eq!(owner.relation, "primary_ip4_for");
        assert!(owner.custom_fields);
        assert_eq!(owner.filter("platform").unwrap().record_path(), "platform.name");

        assert_eq!(ips.relation_filter("interfaces_name").unwrap().relation, "interfaces");
        assert!(ips.relation_filter("pip4for_").is_none());
        assert!(ips.relation_filter("address").is_none());

        let devices = registry.endpoint("nb.devices").unwrap();
        let interfaces = devices.relation_filter("interfaces_enabled").unwrap();
        assert_eq!(interfaces.filter("enabled").unwrap().kind, FieldKind::Boolean);
        assert!(!interfaces.custom_fields);
    }

    // ── 2. endpoint resolution ────────────────────────────────────────────────

    #[test]
    fn test_resolve_defaults_alias_to_table() {
        let registry = SchemaRegistry::builtin().unwrap();
        let handle = registry.resolve("nb.devices").unwrap();
        assert_eq!(handle.name, "nb.devices");
        assert_eq!(handle.alias, "devices");
        assert_eq!(handle.schema().root, "devices");
    }

    #[test]
    fn test_resolve_with_alias() {
        let registry = SchemaRegistry::builtin().unwrap();
        let handle = registry.resolve("  nb.vlans AS v ").unwrap();
        assert_eq!(handle.name, "nb.vlans");
        assert_eq!(handle.alias, "v");
    }

    #[test]
    fn test_resolve_unknown_endpoint() {
        let registry = SchemaRegistry::builtin().unwrap();
        let err = registry.resolve("nb.racks").unwrap_err();
        assert!(matches!(err, VeritasError::UnknownEndpoint { ref name } if name == "nb.racks"));
    }

    #[test]
    fn test_endpoint_name_without_namespace_is_unknown() {
        let err = EndpointName::parse("devices").unwrap_err();
        assert!(matches!(err, VeritasError::UnknownEndpoint { .. }));
    }

    #[test]
    fn test_endpoint_name_malformed_alias_clause() {
        let err = EndpointName::parse("nb.devices d").unwrap_err();
        assert!(matches!(err, VeritasError::ParseError { .. }));
    }

    // ── 3. TOML loading ───────────────────────────────────────────────────────

    #[test]
    fn test_malformed_schema_toml_is_config_error() {
        let err = SchemaRegistry::from_toml_str("[[endpoints]]\nname = 42").unwrap_err();
        match err {
            VeritasError::ConfigError { reason } => {
                assert!(reason.contains("failed to parse schema TOML"), "got: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_endpoint_last_wins() {
        let toml = r#"
            [[endpoints]]
            name = "nb.devices"
            root = "devices"

            [[endpoints]]
            name = "nb.devices"
            root = "dcim_devices"
        "#;
        let registry = SchemaRegistry::from_toml_str(toml).unwrap();
        assert_eq!(registry.endpoint("nb.devices").unwrap().root, "dcim_devices");
    }

    #[test]
    fn test_custom_field_registration() {
        let registry = SchemaRegistry::builtin()
            .unwrap()
            .with_custom_field(CustomFieldDef::new("net", CustomFieldType::Select))
            .with_custom_field(CustomFieldDef::new("checkmk", CustomFieldType::Boolean));

        assert_eq!(registry.custom_field("net").unwrap().kind(), FieldKind::Scalar);
        assert_eq!(registry.custom_field("checkmk").unwrap().kind(), FieldKind::Boolean);
        assert!(registry.custom_field("site").is_none());
    }

    // ── 4. config ─────────────────────────────────────────────────────────────

    const CONFIG: &str = r#"
        [nautobot]
        url = "https://nautobot.example.com"
        token = "secret"

        [logging]
        level = "debug"

        [[custom_fields]]
        name = "net"
        type = "select"

        [[custom_fields]]
        name = "snmp_credentials"
        type = "text"
    "#;

    #[test]
    fn test_config_defaults() {
        let config = SotConfig::from_toml_str(CONFIG).unwrap();
        let nautobot = config.nautobot.as_ref().unwrap();
        assert!(nautobot.ssl_verify);
        assert_eq!(nautobot.api_version, "2.0");
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert!(config.schema.path.is_none());
    }

    #[test]
    fn test_config_registry_includes_custom_fields() {
        let config = SotConfig::from_toml_str(CONFIG).unwrap();
        let registry = config.registry().unwrap();
        assert!(registry.endpoint("nb.devices").is_some());
        assert_eq!(
            registry.custom_field("snmp_credentials").unwrap().field_type,
            CustomFieldType::Text
        );
    }

    #[test]
    fn test_config_relative_schema_path_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("schema.toml"),
            "[[endpoints]]\nname = \"lab.hosts\"\nroot = \"hosts\"\n",
        )
        .unwrap();
        let config_path = dir.path().join("app.toml");
        fs::write(&config_path, "[schema]\npath = \"schema.toml\"\n").unwrap();

        let config = SotConfig::load(&config_path).unwrap();
        let registry = config.registry().unwrap();
        assert!(registry.endpoint("lab.hosts").is_some());
        assert!(registry.endpoint("nb.devices").is_none());
    }

    // ── 5. config discovery ───────────────────────────────────────────────────

    #[test]
    fn test_locator_prefers_home_over_app_path() {
        let home = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();

        let home_dir = home.path().join(".veritas/miniapps/inventory");
        fs::create_dir_all(&home_dir).unwrap();
        fs::write(home_dir.join("inventory.toml"), "[logging]\nlevel = \"home\"\n").unwrap();
        fs::write(app.path().join("inventory.toml"), "[logging]\nlevel = \"app\"\n").unwrap();

        let config = ConfigLocator::new("inventory", app.path())
            .home(home.path())
            .load()
            .unwrap();
        assert_eq!(config.logging.level.as_deref(), Some("home"));
    }

    #[test]
    fn test_locator_falls_back_to_conf_subdir() {
        let home = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();
        fs::create_dir_all(app.path().join("conf")).unwrap();
        fs::write(app.path().join("conf/custom.toml"), "[logging]\nlevel = \"conf\"\n").unwrap();

        let locator = ConfigLocator::new("inventory", app.path())
            .home(home.path())
            .etc(home.path().join("etc"))
            .config_file("custom.toml");
        assert_eq!(locator.locate().unwrap(), app.path().join("conf/custom.toml"));
    }

    #[test]
    fn test_locator_absolute_config_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "").unwrap();

        let locator = ConfigLocator::new("inventory", dir.path())
            .home(dir.path())
            .config_file(explicit.to_string_lossy().to_string());
        assert_eq!(locator.candidates()[0], explicit);
        assert_eq!(locator.locate().unwrap(), explicit);
    }

    #[test]
    fn test_locator_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLocator::new("inventory", dir.path())
            .home(dir.path())
            .etc(dir.path().join("etc"))
            .load()
            .unwrap_err();
        assert!(matches!(err, VeritasError::ConfigError { .. }));
    }
}
