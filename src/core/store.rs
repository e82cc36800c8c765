//! The authoritative in-memory property map.

use crate::convert::ValueConverter;
use crate::error::{PropertyError, Result};
use crate::notify::PropertyChangeEvent;
use crate::sources::Snapshot;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum number of `${...}` hops followed by [`PropertyStore::resolve`].
pub const MAX_RESOLUTION_DEPTH: usize = 16;

/// Thread-safe key → raw value store.
///
/// Reads are lock-free: the map lives behind an `ArcSwap` and every reader sees
/// a complete, immutable version. Writers serialize on a single mutex, copy the
/// current version, apply their change and swap the new version in, so a
/// multi-key reload becomes visible all at once.
///
/// Keys only enter the store through the initial load or a reload
/// ([`apply_snapshot`](Self::apply_snapshot)), and only leave it through
/// [`remove`](Self::remove).
pub struct PropertyStore {
    current: ArcSwap<HashMap<String, String>>,
    writer: Mutex<()>,
    converter: ValueConverter,
}

impl PropertyStore {
    /// Create a store from its initial contents.
    pub fn new<I, K, V>(initial: I, converter: ValueConverter) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = initial
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self {
            current: ArcSwap::from_pointee(map),
            writer: Mutex::new(()),
            converter,
        }
    }

    /// Create a store from a snapshot using the default converter.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::new(snapshot, ValueConverter::new())
    }

    /// Get the raw value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown.
    pub fn get(&self, key: &str) -> Result<String> {
        self.current
            .load()
            .get(key)
            .cloned()
            .ok_or_else(|| PropertyError::PropertyNotFound(key.to_string()))
    }

    /// Get the value of `key` converted to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown, or
    /// [`PropertyError::ConversionError`] if the value cannot be converted.
    pub fn get_parsed<T: Any + Send>(&self, key: &str) -> Result<T> {
        let raw = self.get(key)?;
        self.converter.convert_required::<T>(&raw)
    }

    /// Get the value of `key` with any `#{ ... }` expression evaluated.
    ///
    /// # Errors
    ///
    /// Same as [`get_parsed`](Self::get_parsed).
    pub fn get_evaluated(&self, key: &str) -> Result<String> {
        let raw = self.get(key)?;
        self.converter
            .resolve_expression(&raw)
            .map(|value| value.into_owned())
    }

    /// Returns `true` if `key` is known.
    pub fn contains(&self, key: &str) -> bool {
        self.current.load().contains_key(key)
    }

    /// Number of known keys.
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Replace the value of an existing key.
    ///
    /// Returns the change event if the value actually changed, `None` if the
    /// new value equals the current one.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown; the
    /// store is left unmodified.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<Option<PropertyChangeEvent>> {
        let value = value.into();
        let _writer = self.writer.lock();

        let current = self.current.load_full();
        let old = current
            .get(key)
            .ok_or_else(|| PropertyError::PropertyNotFound(key.to_string()))?;
        if *old == value {
            return Ok(None);
        }

        let event = PropertyChangeEvent::new(key, Some(old.clone()), value.clone());
        let mut next = (*current).clone();
        next.insert(key.to_string(), value);
        self.current.store(Arc::new(next));

        Ok(Some(event))
    }

    /// Define or replace every key of `snapshot` whose value differs.
    ///
    /// Keys missing from the snapshot are left untouched. All changes become
    /// visible in a single swap; the returned events are in key order.
    pub fn apply_snapshot(&self, snapshot: &Snapshot) -> Vec<PropertyChangeEvent> {
        let _writer = self.writer.lock();

        let current = self.current.load_full();
        let events: Vec<PropertyChangeEvent> = snapshot
            .iter()
            .filter(|(key, value)| current.get(*key).map(String::as_str) != Some(*value))
            .map(|(key, value)| PropertyChangeEvent::new(key, current.get(key).cloned(), value))
            .collect();

        if !events.is_empty() {
            let mut next = (*current).clone();
            for event in &events {
                next.insert(event.key.clone(), event.new_value.clone());
            }
            self.current.store(Arc::new(next));
        }

        events
    }

    /// Remove `key` from the store and return its last value.
    ///
    /// No change event is produced for a removal.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown.
    pub fn remove(&self, key: &str) -> Result<String> {
        let _writer = self.writer.lock();

        let current = self.current.load_full();
        if !current.contains_key(key) {
            return Err(PropertyError::PropertyNotFound(key.to_string()));
        }

        let mut next = (*current).clone();
        let removed = next.remove(key).unwrap_or_default();
        self.current.store(Arc::new(next));
        Ok(removed)
    }

    /// Point-in-time copy of every key and value.
    pub fn snapshot_all(&self) -> Snapshot {
        self.current
            .load()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get the value of `key`, following `${other.key}` references.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key or any key in the
    /// chain is unknown, and [`PropertyError::ResolutionError`] on a cycle or
    /// once [`MAX_RESOLUTION_DEPTH`] hops are exceeded.
    pub fn resolve(&self, key: &str) -> Result<String> {
        let map = self.current.load();
        let mut chain = vec![key.to_string()];
        let mut value = map
            .get(key)
            .ok_or_else(|| PropertyError::PropertyNotFound(key.to_string()))?;

        while let Some(next) = reference_key(value) {
            let seen = chain.iter().any(|k| k == next);
            chain.push(next.to_string());
            if seen || chain.len() > MAX_RESOLUTION_DEPTH + 1 {
                return Err(PropertyError::ResolutionError {
                    key: key.to_string(),
                    chain,
                });
            }
            value = map
                .get(next)
                .ok_or_else(|| PropertyError::PropertyNotFound(next.to_string()))?;
        }

        Ok(value.clone())
    }

    /// The converter used by [`get_parsed`](Self::get_parsed).
    pub fn converter(&self) -> &ValueConverter {
        &self.converter
    }
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore")
            .field("keys", &self.len())
            .finish_non_exhaustive()
    }
}

/// Returns the referenced key if `value` is exactly `${key}`.
fn reference_key(value: &str) -> Option<&str> {
    value
        .trim()
        .strip_prefix("${")?
        .strip_suffix('}')
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn store(pairs: &[(&str, &str)]) -> PropertyStore {
        PropertyStore::new(pairs.iter().copied(), ValueConverter::new())
    }

    #[test]
    fn test_get_and_contains() {
        let store = store(&[("a", "1")]);
        assert_eq!(store.get("a").unwrap(), "1");
        assert!(store.contains("a"));
        assert!(!store.contains("b"));
        assert!(store.get("b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_set_returns_event_with_old_value() {
        let store = store(&[("a", "1")]);
        let event = store.set("a", "2").unwrap().unwrap();
        assert_eq!(event.key, "a");
        assert_eq!(event.old_value.as_deref(), Some("1"));
        assert_eq!(event.new_value, "2");
        assert_eq!(store.get("a").unwrap(), "2");
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let store = store(&[("a", "1")]);
        assert!(store.set("a", "1").unwrap().is_none());
        assert!(store.set("a", "2").unwrap().is_some());
        assert!(store.set("a", "2").unwrap().is_none());
    }

    #[test]
    fn test_set_unknown_key_fails() {
        let store = store(&[("a", "1")]);
        let err = store.set("b", "2").unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.contains("b"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_apply_snapshot_defines_and_replaces() {
        let store = store(&[("a", "1"), ("b", "2"), ("kept", "x")]);
        let snapshot: Snapshot = [("a", "1"), ("b", "20"), ("c", "3")].into_iter().collect();

        let events = store.apply_snapshot(&snapshot);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, "b");
        assert_eq!(events[0].old_value.as_deref(), Some("2"));
        assert_eq!(events[1].key, "c");
        assert!(events[1].is_addition());

        assert_eq!(store.get("b").unwrap(), "20");
        assert_eq!(store.get("c").unwrap(), "3");
        assert_eq!(store.get("kept").unwrap(), "x");
    }

    #[test]
    fn test_apply_identical_snapshot_yields_no_events() {
        let store = store(&[("a", "1")]);
        let snapshot: Snapshot = [("a", "1")].into_iter().collect();
        assert!(store.apply_snapshot(&snapshot).is_empty());
    }

    #[test]
    fn test_remove() {
        let store = store(&[("a", "1")]);
        assert_eq!(store.remove("a").unwrap(), "1");
        assert!(!store.contains("a"));
        assert!(store.remove("a").is_err());
        assert!(store.set("a", "2").is_err());
    }

    #[test]
    fn test_get_parsed() {
        let store = store(&[("port", "8080"), ("expr", "#{ 1+1 }"), ("timeout", "5m"), ("bad", "x")]);
        assert_eq!(store.get_parsed::<u16>("port").unwrap(), 8080);
        assert_eq!(store.get_parsed::<i32>("expr").unwrap(), 2);
        assert_eq!(
            store.get_parsed::<Duration>("timeout").unwrap(),
            Duration::from_secs(300)
        );
        assert!(matches!(
            store.get_parsed::<i32>("bad"),
            Err(PropertyError::ConversionError { .. })
        ));
        assert!(store.get_parsed::<Duration>("bad").is_err());
        assert!(store.get_parsed::<i32>("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_evaluated() {
        let store = store(&[("expr", "#{ 'a' + 'b' }"), ("plain", "value")]);
        assert_eq!(store.get_evaluated("expr").unwrap(), "ab");
        assert_eq!(store.get_evaluated("plain").unwrap(), "value");
    }

    #[test]
    fn test_snapshot_all_is_detached_copy() {
        let store = store(&[("a", "1")]);
        let snapshot = store.snapshot_all();
        store.set("a", "2").unwrap();
        assert_eq!(snapshot.get("a"), Some("1"));
        assert_eq!(store.snapshot_all().get("a"), Some("2"));
    }

    #[test]
    fn test_resolve_follows_references() {
        let store = store(&[("a", "${b}"), ("b", "${ c }"), ("c", "value")]);
        assert_eq!(store.resolve("a").unwrap(), "value");
        assert_eq!(store.resolve("c").unwrap(), "value");
    }

    #[test]
    fn test_resolve_detects_cycles() {
        let store = store(&[("a", "${b}"), ("b", "${a}")]);
        match store.resolve("a") {
            Err(PropertyError::ResolutionError { key, chain }) => {
                assert_eq!(key, "a");
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected resolution error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_depth_limit() {
        let pairs: Vec<(String, String)> = (0..40)
            .map(|i| (format!("k{}", i), format!("${{k{}}}", i + 1)))
            .collect();
        let store = PropertyStore::new(pairs, ValueConverter::new());
        assert!(matches!(
            store.resolve("k0"),
            Err(PropertyError::ResolutionError { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_reference() {
        let store = store(&[("a", "${nowhere}")]);
        assert!(store.resolve("a").unwrap_err().is_not_found());
    }

    #[test]
    fn test_concurrent_writers_serialize() {
        let store = Arc::new(store(&[("a", "0"), ("b", "0")]));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = if (t + i) % 2 == 0 { "a" } else { "b" };
                        store.set(key, format!("{}-{}", t, i)).unwrap();
                        let snapshot: Snapshot =
                            [(format!("t{}", t), i.to_string())].into_iter().collect();
                        store.apply_snapshot(&snapshot);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 10);
        for t in 0..8 {
            assert_eq!(store.get(&format!("t{}", t)).unwrap(), "49");
        }
    }
}
