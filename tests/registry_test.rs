//! Registry loading against the descriptors shipped in the repo.

use std::path::Path;

use flowql::descriptor::{ColumnType, MetricClass, Registry};

fn load() -> Registry {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("db_descriptions");
    Registry::load(&dir).expect("descriptor load should succeed")
}

#[test]
fn test_load_flow_log_descriptors() {
    let registry = load();
    let db = registry.database("flow_log").expect("flow_log is described");
    assert!(!db.tags().is_empty());
    assert!(!db.metrics().is_empty());

    let byte = registry.lookup("flow_log", "byte").unwrap();
    assert_eq!(byte.server_name, "byte_tx+byte_rx");
    assert_eq!(byte.metric_class(), MetricClass::Counter);

    let rtt = registry.lookup("flow_log", "rtt").unwrap();
    assert_eq!(rtt.metric_class(), MetricClass::Delay);

    let ip = registry.lookup("flow_log", "ip_0").unwrap();
    assert_eq!(ip.kind, ColumnType::Ip);

    let time = registry.lookup("flow_log", "time").unwrap();
    assert_eq!(time.kind, ColumnType::Time);
}

#[test]
fn test_load_enum_values_preserve_order() {
    let registry = load();
    let values = registry.lookup_enum("tap_side").unwrap();
    let pairs: Vec<(&str, &str)> = values
        .iter()
        .map(|v| (v.value.as_str(), v.display.as_str()))
        .collect();
    assert_eq!(pairs, vec![("0", "rest"), ("1", "c"), ("2", "s")]);
}

#[test]
fn test_deprecated_and_permission_bits() {
    let registry = load();
    let vlan = registry.lookup("flow_log", "vlan").unwrap();
    assert!(vlan.deprecated);
    assert!(vlan.permission.allows(0));
    assert!(!vlan.permission.allows(2));
}

#[test]
fn test_unknown_names_fail() {
    let registry = load();
    assert!(registry.lookup("flow_log", "no_such_column").is_err());
    assert!(registry.lookup("no_such_db", "byte").is_err());
    assert!(registry.lookup_enum("no_such_enum").is_err());
}
