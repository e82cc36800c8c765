//! Full integration tests exercising watching, reloading and notification together.

#![cfg(feature = "file-watch")]

use parking_lot::Mutex;
use reloadable_properties::management::{ManagementFacade, ManagementRequest, ManagementResponse};
use reloadable_properties::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

const DEBOUNCE: Duration = Duration::from_millis(300);
const CHECK_INTERVAL: Duration = Duration::from_millis(50);
const SETTLE: Duration = Duration::from_millis(1200);

fn setup(content: &str) -> (TempDir, PathBuf, ReloadableProperties) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.properties");
    fs::write(&path, content).unwrap();

    let properties = ReloadableProperties::builder()
        .with_file(&path)
        .with_debounce(DEBOUNCE)
        .with_check_interval(CHECK_INTERVAL)
        .build()
        .unwrap();

    (temp_dir, path, properties)
}

fn record_events(properties: &ReloadableProperties) -> (Arc<Mutex<Vec<PropertyChangeEvent>>>, SubscriptionHandle) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let handle = properties.subscribe(move |event| {
        events_clone.lock().push(event.clone());
        Ok(())
    });
    (events, handle)
}

#[tokio::test]
async fn test_reload_convergence() {
    let (_dir, path, properties) = setup("server.port=8080\nserver.host=localhost\nkept=1\n");
    let (events, _handle) = record_events(&properties);

    assert_eq!(properties.start_watching(), 1);
    assert!(properties.is_watching());
    sleep(Duration::from_millis(100)).await;

    fs::write(&path, "server.port=9090\nserver.host=0.0.0.0\nkept=1\nadded=yes\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(properties.get_parsed_property::<u16>("server.port").unwrap(), 9090);
    assert_eq!(properties.get_property("server.host").unwrap(), "0.0.0.0");
    assert_eq!(properties.get_property("added").unwrap(), "yes");

    let events = events.lock();
    let mut keys: Vec<&str> = events.iter().map(|e| e.key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["added", "server.host", "server.port"]);

    let port = events.iter().find(|e| e.key == "server.port").unwrap();
    assert_eq!(port.old_value.as_deref(), Some("8080"));
    assert_eq!(port.new_value, "9090");

    properties.stop_watching();
}

#[tokio::test]
async fn test_debounce_coalesces_burst() {
    let (_dir, path, properties) = setup("counter=0\n");
    let (events, _handle) = record_events(&properties);

    properties.start_watching();
    sleep(Duration::from_millis(100)).await;

    for i in 1..=5 {
        fs::write(&path, format!("counter={}\n", i)).unwrap();
        sleep(Duration::from_millis(40)).await;
    }
    sleep(SETTLE).await;

    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].new_value, "5");
    assert_eq!(properties.get_property("counter").unwrap(), "5");

    properties.stop_watching();
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_values() {
    let (_dir, path, properties) = setup("a=1\nb=2\n");
    let (events, _handle) = record_events(&properties);
    let before = properties.list_properties();

    properties.start_watching();
    sleep(Duration::from_millis(100)).await;

    fs::write(&path, "a=100\nthis line is malformed\nb=200\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(properties.list_properties(), before);
    assert!(events.lock().is_empty());

    // The watcher keeps running and picks up the repaired file
    fs::write(&path, "a=100\nb=200\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(properties.get_property("a").unwrap(), "100");
    assert_eq!(events.lock().len(), 2);

    properties.stop_watching();
}

#[tokio::test]
async fn test_subscriber_failure_does_not_block_others() {
    let (_dir, path, properties) = setup("a=1\n");
    let _failing = properties.subscribe(|_| Err("broken subscriber".into()));
    let _panicking = properties.subscribe(|_| panic!("subscriber bug"));
    let (events, _handle) = record_events(&properties);

    properties.start_watching();
    sleep(Duration::from_millis(100)).await;

    fs::write(&path, "a=2\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(events.lock().len(), 1);
    properties.stop_watching();
}

#[tokio::test]
async fn test_bindings_follow_file_changes() {
    let (_dir, path, properties) = setup("pool.size=4\nrequest.timeout=5s\n");

    let pool_size = Arc::new(Mutex::new(0usize));
    let target = Arc::clone(&pool_size);
    let _binding = properties
        .bind("pool.size", move |size: usize| *target.lock() = size)
        .unwrap();
    let timeout = properties.bind_value::<Duration>("request.timeout").unwrap();

    assert_eq!(*pool_size.lock(), 4);
    assert_eq!(*timeout.get().unwrap(), Duration::from_secs(5));

    properties.start_watching();
    sleep(Duration::from_millis(100)).await;

    fs::write(&path, "pool.size=16\nrequest.timeout=2m\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(*pool_size.lock(), 16);
    assert_eq!(*timeout.get().unwrap(), Duration::from_secs(120));

    properties.stop_watching();
}

#[tokio::test]
async fn test_stop_watching_is_final() {
    let (_dir, path, properties) = setup("a=1\n");
    let (events, _handle) = record_events(&properties);

    properties.start_watching();
    properties.stop_watching();
    properties.stop_watching();
    assert!(!properties.is_watching());

    fs::write(&path, "a=2\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(properties.get_property("a").unwrap(), "1");
    assert!(events.lock().is_empty());
}

#[tokio::test]
async fn test_unwatchable_resource_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let good = temp_dir.path().join("good.properties");
    let doomed = temp_dir.path().join("doomed.properties");
    fs::write(&good, "a=1\n").unwrap();
    fs::write(&doomed, "b=1\n").unwrap();

    let properties = ReloadableProperties::builder()
        .with_file(&good)
        .with_file(&doomed)
        .with_debounce(DEBOUNCE)
        .with_check_interval(CHECK_INTERVAL)
        .build()
        .unwrap();

    fs::remove_file(&doomed).unwrap();
    assert_eq!(properties.start_watching(), 1);
    assert_eq!(properties.watched_resources().len(), 1);

    sleep(Duration::from_millis(100)).await;
    fs::write(&good, "a=2\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(properties.get_property("a").unwrap(), "2");
    assert_eq!(properties.get_property("b").unwrap(), "1");

    properties.stop_watching();
}

#[tokio::test]
async fn test_management_set_and_reload_share_store() {
    let (_dir, path, properties) = setup("mode=slow\n");
    let (events, _handle) = record_events(&properties);
    let facade = ManagementFacade::new(Arc::new(properties.clone()));

    let response = facade.handle(ManagementRequest::Set {
        key: "mode".into(),
        value: "fast".into(),
    });
    assert_eq!(
        response,
        ManagementResponse::Updated {
            key: "mode".into(),
            changed: true
        }
    );
    assert_eq!(events.lock().len(), 1);

    properties.start_watching();
    sleep(Duration::from_millis(100)).await;

    fs::write(&path, "mode=turbo\n").unwrap();
    sleep(SETTLE).await;

    assert_eq!(
        facade.handle(ManagementRequest::Get { key: "mode".into() }),
        ManagementResponse::Value {
            key: "mode".into(),
            value: "turbo".into()
        }
    );
    assert_eq!(events.lock().len(), 2);

    properties.stop_watching();
}

#[tokio::test]
async fn test_change_before_watching_is_applied() {
    let (_dir, path, properties) = setup("a=1\nb=1\n");
    let (events, _handle) = record_events(&properties);

    fs::write(&path, "a=2\nb=1\n").unwrap();
    properties.start_watching();
    sleep(SETTLE).await;

    assert_eq!(properties.get_property("a").unwrap(), "2");
    let events = events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, "a");

    properties.stop_watching();
}

#[tokio::test]
async fn test_start_watching_keeps_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("base.properties");
    let prod = temp_dir.path().join("prod.properties");
    fs::write(&base, "port=80\nhost=localhost\n").unwrap();
    fs::write(&prod, "port=443\n").unwrap();

    let properties = ReloadableProperties::builder()
        .with_file(&base)
        .with_file(&prod)
        .with_debounce(DEBOUNCE)
        .with_check_interval(CHECK_INTERVAL)
        .build()
        .unwrap();
    let (events, _handle) = record_events(&properties);

    assert_eq!(properties.start_watching(), 2);
    sleep(SETTLE).await;

    assert_eq!(properties.get_property("port").unwrap(), "443");
    assert!(events.lock().is_empty());

    properties.stop_watching();
}
