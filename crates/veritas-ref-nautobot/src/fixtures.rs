//! Lab inventory for the veritas reference runtime.
//!
//! All data in this module is hardcoded and fictional. Records are stored the
//! way nautobot's GraphQL schema names its attributes: devices carry `name`
//! (surfaced to queries as `hostname`) and custom fields live in the
//! `_custom_field_data` bag.

use std::collections::HashMap;

use serde_json::{json, Value};

use veritas_contracts::{
    error::VeritasResult,
    request::Record,
    schema::{CustomFieldDef, CustomFieldType},
};
use veritas_schema::SchemaRegistry;

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

// ── Devices ───────────────────────────────────────────────────────────────────

/// Three devices across two locations.
///
/// - `lab.local`: ios, default-site, net `testnet`, monitored by checkmk
/// - `switch.local`: ios, site_1, net `prodnet`
/// - `other.example`: nxos, site_1, no custom field values
pub fn devices() -> Vec<Record> {
    records(vec![
        json!({
            "id": "d-1",
            "name": "lab.local",
            "serial": "FOC1111A1AA",
            "asset_tag": "A-0001",
            "config_context": { "ntp": ["10.0.0.123"] },
            "status": { "id": "st-1", "name": "Active" },
            "role": { "id": "r-1", "name": "router" },
            "tenant": null,
            "location": { "id": "l-1", "name": "default-site" },
            "platform": { "id": "p-1", "name": "ios", "manufacturer": { "name": "cisco" } },
            "device_type": { "id": "dt-1", "model": "csr1000v", "manufacturer": { "name": "cisco" } },
            "primary_ip4": { "id": "ip-1", "address": "192.168.0.1/24" },
            "tags": [{ "id": "t-1", "name": "lab" }],
            "interfaces": [
                {
                    "id": "i-1",
                    "name": "GigabitEthernet1",
                    "description": "uplink",
                    "enabled": true,
                    "ip_addresses": [{ "id": "ip-1", "address": "192.168.0.1/24" }]
                },
                {
                    "id": "i-2",
                    "name": "GigabitEthernet2",
                    "description": "",
                    "enabled": false,
                    "ip_addresses": []
                }
            ],
            "_custom_field_data": { "net": "testnet", "checkmk": true, "snmp_credentials": "lab-ro" }
        }),
        json!({
            "id": "d-2",
            "name": "switch.local",
            "serial": "FOC2222B2BB",
            "asset_tag": "A-0002",
            "config_context": {},
            "status": { "id": "st-1", "name": "Active" },
            "role": { "id": "r-2", "name": "switch" },
            "tenant": { "id": "tn-1", "name": "ops" },
            "location": { "id": "l-2", "name": "site_1" },
            "platform": { "id": "p-1", "name": "ios", "manufacturer": { "name": "cisco" } },
            "device_type": { "id": "dt-2", "model": "c9300", "manufacturer": { "name": "cisco" } },
            "primary_ip4": { "id": "ip-2", "address": "192.168.0.2/24" },
            "tags": [],
            "interfaces": [
                {
                    "id": "i-3",
                    "name": "GigabitEthernet1/0/1",
                    "description": "access",
                    "enabled": true,
                    "ip_addresses": [{ "id": "ip-2", "address": "192.168.0.2/24" }]
                }
            ],
            "_custom_field_data": { "net": "prodnet", "checkmk": false, "snmp_credentials": "prod-ro" }
        }),
        json!({
            "id": "d-3",
            "name": "other.example",
            "serial": "SAL3333C3CC",
            "asset_tag": null,
            "config_context": {},
            "status": { "id": "st-2", "name": "Planned" },
            "role": { "id": "r-2", "name": "switch" },
            "tenant": null,
            "location": { "id": "l-2", "name": "site_1" },
            "platform": { "id": "p-2", "name": "nxos", "manufacturer": { "name": "cisco" } },
            "device_type": { "id": "dt-3", "model": "n9k-c93180", "manufacturer": { "name": "cisco" } },
            "primary_ip4": null,
            "tags": [],
            "interfaces": [
                {
                    "id": "i-4",
                    "name": "Ethernet1/1",
                    "description": "",
                    "enabled": true,
                    "ip_addresses": []
                }
            ],
            "_custom_field_data": { "net": null, "checkmk": false, "snmp_credentials": null }
        }),
    ])
}

// ── IPAM ──────────────────────────────────────────────────────────────────────

pub fn prefixes() -> Vec<Record> {
    records(vec![
        json!({
            "id": "pf-1",
            "prefix": "192.168.0.0/24",
            "prefix_length": 24,
            "description": "lab management",
            "type": "network",
            "namespace": { "id": "ns-1", "name": "Global" },
            "status": { "id": "st-1", "name": "Active" },
            "location": { "id": "l-1", "name": "default-site" },
            "vlan": { "id": "v-1", "vid": 100, "name": "data" },
            "tags": [],
            "_custom_field_data": { "net": "testnet" }
        }),
        json!({
            "id": "pf-2",
            "prefix": "192.168.2.0/24",
            "prefix_length": 24,
            "description": "voice",
            "type": "network",
            "namespace": { "id": "ns-1", "name": "Global" },
            "status": { "id": "st-1", "name": "Active" },
            "location": { "id": "l-2", "name": "site_1" },
            "vlan": { "id": "v-2", "vid": 200, "name": "voice" },
            "tags": [],
            "_custom_field_data": { "net": "prodnet" }
        }),
        json!({
            "id": "pf-3",
            "prefix": "10.0.0.0/8",
            "prefix_length": 8,
            "description": "container",
            "type": "container",
            "namespace": { "id": "ns-1", "name": "Global" },
            "status": { "id": "st-1", "name": "Active" },
            "location": null,
            "vlan": null,
            "tags": [{ "id": "t-2", "name": "aggregate" }],
            "_custom_field_data": { "net": null }
        }),
    ])
}

/// Two addresses owned by a device as primary IPv4, one unassigned.
pub fn ip_addresses() -> Vec<Record> {
    records(vec![
        json!({
            "id": "ip-1",
            "address": "192.168.0.1/24",
            "dns_name": "lab.local",
            "description": "",
            "status": { "id": "st-1", "name": "Active" },
            "role": null,
            "parent": { "id": "pf-1", "prefix": "192.168.0.0/24" },
            "tags": [],
            "interfaces": [
                { "id": "i-1", "name": "GigabitEthernet1", "device": { "id": "d-1", "name": "lab.local" } }
            ],
            "primary_ip4_for": [
                {
                    "id": "d-1",
                    "name": "lab.local",
                    "serial": "FOC1111A1AA",
                    "platform": { "name": "ios" },
                    "_custom_field_data": { "net": "testnet", "checkmk": true }
                }
            ],
            "_custom_field_data": {}
        }),
        json!({
            "id": "ip-2",
            "address": "192.168.0.2/24",
            "dns_name": "switch.local",
            "description": "",
            "status": { "id": "st-1", "name": "Active" },
            "role": null,
            "parent": { "id": "pf-1", "prefix": "192.168.0.0/24" },
            "tags": [],
            "interfaces": [
                { "id": "i-3", "name": "GigabitEthernet1/0/1", "device": { "id": "d-2", "name": "switch.local" } }
            ],
            "primary_ip4_for": [
                {
                    "id": "d-2",
                    "name": "switch.local",
                    "serial": "FOC2222B2BB",
                    "platform": { "name": "ios" },
                    "_custom_field_data": { "net": "prodnet", "checkmk": false }
                }
            ],
            "_custom_field_data": {}
        }),
        json!({
            "id": "ip-3",
            "address": "192.168.2.10/24",
            "dns_name": "",
            "description": "reserved",
            "status": { "id": "st-3", "name": "Reserved" },
            "role": null,
            "parent": { "id": "pf-2", "prefix": "192.168.2.0/24" },
            "tags": [],
            "interfaces": [],
            "primary_ip4_for": [],
            "_custom_field_data": {}
        }),
    ])
}

pub fn vlans() -> Vec<Record> {
    let tagged = |iface: &str, name: &str, device: &str, device_name: &str| {
        json!([{ "id": iface, "name": name, "device": { "id": device, "name": device_name } }])
    };
    records(vec![
        json!({
            "id": "v-1",
            "vid": 100,
            "name": "data",
            "status": { "id": "st-1", "name": "Active" },
            "role": null,
            "location": { "id": "l-1", "name": "default-site" },
            "vlan_group": null,
            "tags": [],
            "interfaces_as_tagged": tagged("i-1", "GigabitEthernet1", "d-1", "lab.local"),
            "interfaces_as_untagged": [],
            "_custom_field_data": {}
        }),
        json!({
            "id": "v-2",
            "vid": 200,
            "name": "voice",
            "status": { "id": "st-1", "name": "Active" },
            "role": null,
            "location": { "id": "l-2", "name": "site_1" },
            "vlan_group": null,
            "tags": [],
            "interfaces_as_tagged": tagged("i-3", "GigabitEthernet1/0/1", "d-2", "switch.local"),
            "interfaces_as_untagged": [],
            "_custom_field_data": {}
        }),
        json!({
            "id": "v-3",
            "vid": 300,
            "name": "mgmt",
            "status": { "id": "st-1", "name": "Active" },
            "role": null,
            "location": null,
            "vlan_group": null,
            "tags": [],
            "interfaces_as_tagged": [],
            "interfaces_as_untagged": [],
            "_custom_field_data": {}
        }),
    ])
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// The single record behind `nb.general`: one list per catalog root.
pub fn general() -> Vec<Record> {
    records(vec![json!({
        "locations": [
            {
                "id": "l-1",
                "name": "default-site",
                "description": "lab",
                "location_type": { "name": "site" },
                "parent": null
            },
            {
                "id": "l-2",
                "name": "site_1",
                "description": "",
                "location_type": { "name": "site" },
                "parent": null
            }
        ],
        "tags": [{ "id": "t-1", "name": "lab" }, { "id": "t-2", "name": "aggregate" }],
        "platforms": [{ "id": "p-1", "name": "ios" }, { "id": "p-2", "name": "nxos" }],
        "roles": [
            { "id": "r-1", "name": "router", "content_types": ["dcim.device"] },
            { "id": "r-2", "name": "switch", "content_types": ["dcim.device"] }
        ],
        "manufacturers": [{ "id": "m-1", "name": "cisco" }],
        "device_types": [
            { "id": "dt-1", "model": "csr1000v" },
            { "id": "dt-2", "model": "c9300" },
            { "id": "dt-3", "model": "n9k-c93180" }
        ]
    })])
}

/// Every fixture table, keyed by logical endpoint name.
pub fn tables() -> HashMap<String, Vec<Record>> {
    HashMap::from([
        ("nb.devices".to_string(), devices()),
        ("nb.ipaddresses".to_string(), ip_addresses()),
        ("nb.prefixes".to_string(), prefixes()),
        ("nb.vlans".to_string(), vlans()),
        ("nb.general".to_string(), general()),
    ])
}

/// The lab's custom fields.
pub fn custom_fields() -> Vec<CustomFieldDef> {
    vec![
        CustomFieldDef::new("net", CustomFieldType::Select),
        CustomFieldDef::new("snmp_credentials", CustomFieldType::Text),
        CustomFieldDef::new("checkmk", CustomFieldType::Boolean),
    ]
}

/// The built-in nautobot schema with the lab's custom fields registered.
pub fn lab_registry() -> VeritasResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::builtin()?;
    for def in custom_fields() {
        registry.register_custom_field(def);
    }
    Ok(registry)
}
