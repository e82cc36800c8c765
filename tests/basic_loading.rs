//! Integration tests for loading, reading and writing properties.

use reloadable_properties::prelude::*;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_single_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        &temp_dir,
        "app.properties",
        r#"
# server settings
server.port = 8080
server.host: localhost
server.timeout=30s
! legacy comment
greeting=hello \
  world
"#,
    );

    let properties = ReloadableProperties::builder()
        .with_file(&path)
        .build()
        .unwrap();

    assert_eq!(properties.get_property("server.port").unwrap(), "8080");
    assert_eq!(properties.get_property("server.host").unwrap(), "localhost");
    assert_eq!(properties.get_parsed_property::<u16>("server.port").unwrap(), 8080);
    assert_eq!(
        properties.get_parsed_property::<Duration>("server.timeout").unwrap(),
        Duration::from_secs(30)
    );
    assert_eq!(properties.get_property("greeting").unwrap(), "hello world");
    assert_eq!(properties.list_properties().len(), 4);
}

#[test]
fn test_later_files_override_earlier() {
    let temp_dir = TempDir::new().unwrap();
    let base = write(&temp_dir, "base.properties", "port=80\nhost=localhost\n");
    let prod = write(&temp_dir, "prod.properties", "port=443\n");

    let properties = ReloadableProperties::builder()
        .with_file(&base)
        .with_file(&prod)
        .build()
        .unwrap();

    assert_eq!(properties.get_property("port").unwrap(), "443");
    assert_eq!(properties.get_property("host").unwrap(), "localhost");
    assert_eq!(properties.resources().len(), 2);
}

#[test]
fn test_missing_file_fails_build() {
    let temp_dir = TempDir::new().unwrap();
    let result = ReloadableProperties::builder()
        .with_file(temp_dir.path().join("missing.properties"))
        .build();

    assert!(matches!(result, Err(PropertyError::ResourceLoadError { .. })));
}

#[test]
fn test_malformed_file_fails_build() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(&temp_dir, "bad.properties", "a=1\nthis line has no separator\n");

    let result = ReloadableProperties::builder().with_file(&path).build();
    assert!(matches!(result, Err(PropertyError::ResourceLoadError { .. })));
}

#[test]
fn test_unloadable_resource_can_be_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let good = write(&temp_dir, "good.properties", "a=1\n");

    let properties = ReloadableProperties::builder()
        .with_file(&good)
        .with_file(temp_dir.path().join("missing.properties"))
        .ignore_unloadable_resources(true)
        .build()
        .unwrap();

    assert_eq!(properties.get_property("a").unwrap(), "1");
    assert_eq!(properties.resources().len(), 1);
}

#[test]
fn test_get_unknown_key() {
    let properties = ReloadableProperties::new([("a", "1")].into_iter().collect());
    let err = properties.get_property("b").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Property b not found");
}

#[test]
fn test_set_then_get() {
    let properties = ReloadableProperties::new([("a", "1")].into_iter().collect());
    properties.set_property("a", "2").unwrap();
    assert_eq!(properties.get_property("a").unwrap(), "2");
}

#[test]
fn test_set_unknown_key_leaves_store_unmodified() {
    let properties = ReloadableProperties::new([("a", "1")].into_iter().collect());
    let before = properties.list_properties();

    assert!(properties.set_property("b", "2").unwrap_err().is_not_found());
    assert_eq!(properties.list_properties(), before);
}

#[test]
fn test_idempotent_set_emits_one_event() {
    let properties = ReloadableProperties::new([("a", "1")].into_iter().collect());
    let events = Arc::new(AtomicUsize::new(0));
    let events_clone = Arc::clone(&events);
    let _handle = properties.subscribe(move |_| {
        events_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    properties.set_property("a", "2").unwrap();
    properties.set_property("a", "2").unwrap();

    assert_eq!(properties.get_property("a").unwrap(), "2");
    assert_eq!(events.load(Ordering::SeqCst), 1);
}

#[test]
fn test_expression_round_trip() {
    let properties = ReloadableProperties::new(
        [
            ("sum", "#{ 1+1 }"),
            ("concat", "#{ new String('a').concat('b') }"),
            (
                "injected",
                "#{ new String('EL ').concat('Injected String Value') }",
            ),
            ("broken", "#{ 1 / 0 }"),
        ]
        .into_iter()
        .collect(),
    );

    assert_eq!(properties.get_parsed_property::<i32>("sum").unwrap(), 2);
    assert_eq!(properties.get_parsed_property::<String>("concat").unwrap(), "ab");
    assert_eq!(
        properties.get_evaluated_property("injected").unwrap(),
        "EL Injected String Value"
    );
    assert!(matches!(
        properties.get_parsed_property::<i32>("broken"),
        Err(PropertyError::ConversionError { .. })
    ));
}

#[test]
fn test_indirect_resolution() {
    let properties = ReloadableProperties::new(
        [
            ("db.url", "${db.primary}"),
            ("db.primary", "postgres://primary"),
            ("loop.a", "${loop.b}"),
            ("loop.b", "${loop.a}"),
        ]
        .into_iter()
        .collect(),
    );

    assert_eq!(properties.resolve_property("db.url").unwrap(), "postgres://primary");
    assert!(matches!(
        properties.resolve_property("loop.a"),
        Err(PropertyError::ResolutionError { .. })
    ));
}

#[test]
fn test_failing_subscriber_is_isolated() {
    let properties = ReloadableProperties::new([("a", "1")].into_iter().collect());
    let received = Arc::new(AtomicUsize::new(0));

    let _failing = properties.subscribe(|_| Err("subscriber failure".into()));
    let received_clone = Arc::clone(&received);
    let _good = properties.subscribe(move |event| {
        assert_eq!(event.new_value, "2");
        received_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    properties.set_property("a", "2").unwrap();
    assert_eq!(received.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bound_value_follows_sets() {
    let properties = ReloadableProperties::new([("limit", "10")].into_iter().collect());
    let limit = properties.bind_value::<u32>("limit").unwrap();
    assert_eq!(*limit.get().unwrap(), 10);

    properties.set_property("limit", "25").unwrap();
    assert_eq!(*limit.get().unwrap(), 25);
}

#[test]
fn test_manual_reload_all() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(&temp_dir, "app.properties", "a=1\nb=1\n");

    let properties = ReloadableProperties::builder()
        .with_file(&path)
        .build()
        .unwrap();

    fs::write(&path, "a=2\nb=1\nc=3\n").unwrap();
    let events = properties.reload_all();

    assert_eq!(events.len(), 2);
    assert_eq!(properties.get_property("a").unwrap(), "2");
    assert_eq!(properties.get_property("c").unwrap(), "3");
}

#[test]
fn test_reloading_earlier_file_reapplies_overridden_keys() {
    let temp_dir = TempDir::new().unwrap();
    let base = write(&temp_dir, "base.properties", "port=80\n");
    let prod = write(&temp_dir, "prod.properties", "port=443\n");

    let properties = ReloadableProperties::builder()
        .with_file(&base)
        .with_file(&prod)
        .build()
        .unwrap();
    assert_eq!(properties.get_property("port").unwrap(), "443");

    let events = properties
        .reload_resource(&format!("file:{}", base.display()))
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(properties.get_property("port").unwrap(), "80");

    properties.reload_all();
    assert_eq!(properties.get_property("port").unwrap(), "443");
}
