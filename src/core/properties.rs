//! The main handle over a set of live-reloading properties.

use super::binding::{self, BoundProperty};
use super::{PropertyStore, ReloadOrchestrator, ReloadablePropertiesBuilder, WatchOptions};
use crate::error::{PropertyError, Result};
use crate::notify::{ChangeNotifier, HandlerResult, PropertyChangeEvent, SubscriptionHandle};
use crate::sources::{PropertySource, Snapshot};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[cfg(feature = "file-watch")]
use crate::core::ResourceListener;
#[cfg(feature = "file-watch")]
use crate::notify::PropertiesWatcher;
#[cfg(feature = "file-watch")]
use parking_lot::Mutex;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Live-reloading properties loaded from one or more resources.
///
/// Reads are lock-free. Direct sets and reloads go through the same
/// single-writer path and post one [`PropertyChangeEvent`] per changed key to
/// the subscribers. Clones share the same store, subscribers and watcher.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_properties::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let properties = ReloadableProperties::builder()
///     .with_file("config/app.properties")
///     .build()?;
///
/// let port: u16 = properties.get_parsed_property("server.port")?;
///
/// let _handle = properties.subscribe(|event| {
///     println!("{} is now {}", event.key, event.new_value);
///     Ok(())
/// });
///
/// properties.start_watching();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReloadableProperties {
    store: Arc<PropertyStore>,
    notifier: ChangeNotifier,
    orchestrator: ReloadOrchestrator,
    sources: Arc<Vec<Arc<dyn PropertySource>>>,
    options: WatchOptions,
    #[cfg(feature = "file-watch")]
    watcher: Arc<Mutex<Option<PropertiesWatcher>>>,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
}

impl ReloadableProperties {
    /// Create a handle over fixed initial values, without any resource.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reloadable_properties::prelude::*;
    ///
    /// let properties = ReloadableProperties::new([("answer", "42")].into_iter().collect());
    /// assert_eq!(properties.get_parsed_property::<i32>("answer").unwrap(), 42);
    /// ```
    pub fn new(initial: Snapshot) -> Self {
        Self::from_parts(
            PropertyStore::from_snapshot(initial),
            Vec::new(),
            WatchOptions::default(),
        )
    }

    /// Create a builder.
    pub fn builder() -> ReloadablePropertiesBuilder {
        ReloadablePropertiesBuilder::new()
    }

    pub(crate) fn from_parts(
        store: PropertyStore,
        loaded: Vec<(Arc<dyn PropertySource>, Snapshot)>,
        options: WatchOptions,
    ) -> Self {
        let store = Arc::new(store);
        let notifier = ChangeNotifier::new();
        let orchestrator = ReloadOrchestrator::new(Arc::clone(&store), notifier.clone());

        let mut sources = Vec::with_capacity(loaded.len());
        for (source, snapshot) in loaded {
            orchestrator.record_applied(source.name(), snapshot);
            sources.push(source);
        }

        Self {
            store,
            notifier,
            orchestrator,
            sources: Arc::new(sources),
            options,
            #[cfg(feature = "file-watch")]
            watcher: Arc::new(Mutex::new(None)),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub(crate) fn with_metrics(mut self, metrics: ReloadMetrics) -> Self {
        self.orchestrator = self.orchestrator.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Get the raw value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown.
    pub fn get_property(&self, key: &str) -> Result<String> {
        self.store.get(key)
    }

    /// Get the value of `key` converted to `T`.
    ///
    /// Expressions are evaluated first, then the registered rule for `T` or the
    /// built-in coercion applies.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] or
    /// [`PropertyError::ConversionError`].
    pub fn get_parsed_property<T: Any + Send>(&self, key: &str) -> Result<T> {
        self.store.get_parsed(key)
    }

    /// Get the value of `key` with any `#{ ... }` expression evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] or
    /// [`PropertyError::ConversionError`].
    pub fn get_evaluated_property(&self, key: &str) -> Result<String> {
        self.store.get_evaluated(key)
    }

    /// Get the value of `key`, following `${other.key}` references.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] or
    /// [`PropertyError::ResolutionError`].
    pub fn resolve_property(&self, key: &str) -> Result<String> {
        self.store.resolve(key)
    }

    /// Returns `true` if `key` is known.
    pub fn contains_property(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Point-in-time copy of every property.
    pub fn list_properties(&self) -> Snapshot {
        self.store.snapshot_all()
    }

    /// Replace the value of a known key and notify subscribers.
    ///
    /// Returns the posted event, or `None` if the value was already current.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown.
    pub fn set_property(
        &self,
        key: &str,
        value: impl Into<String>,
    ) -> Result<Option<PropertyChangeEvent>> {
        let event = self.store.set(key, value).inspect_err(|e| {
            warn!(key = %key, error = %e, "Rejected property set");
        })?;

        if let Some(event) = &event {
            debug!(key = %key, "Property set");
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_set();
            }
            self.notifier.post(event);
        }
        Ok(event)
    }

    /// Remove `key` and return its last value. Subscribers are not notified.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown.
    pub fn remove_property(&self, key: &str) -> Result<String> {
        self.store.remove(key)
    }

    /// Register a handler for every change event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&PropertyChangeEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    /// Register a handler for change events of `key` only.
    pub fn subscribe_to<F>(&self, key: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&PropertyChangeEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.notifier.subscribe_to(key, handler)
    }

    /// Call `setter` with the converted value of `key` now and after every
    /// change, until the returned handle is dropped.
    ///
    /// A value that no rule for `T` recognizes leaves the target untouched.
    /// Every change re-reads the store, so concurrent writers cannot leave the
    /// target on an older value. The setter must not write the bound key.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::PropertyNotFound`] if the key is unknown, or
    /// [`PropertyError::ConversionError`] if the current value fails to
    /// convert.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reloadable_properties::prelude::*;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU16, Ordering};
    ///
    /// let properties = ReloadableProperties::new([("port", "80")].into_iter().collect());
    /// let port = Arc::new(AtomicU16::new(0));
    ///
    /// let target = Arc::clone(&port);
    /// let _binding = properties
    ///     .bind("port", move |value: u16| target.store(value, Ordering::SeqCst))
    ///     .unwrap();
    ///
    /// properties.set_property("port", "8080").unwrap();
    /// assert_eq!(port.load(Ordering::SeqCst), 8080);
    /// ```
    pub fn bind<T, F>(&self, key: &str, setter: F) -> Result<SubscriptionHandle>
    where
        T: Any + Send,
        F: Fn(T) + Send + Sync + 'static,
    {
        binding::bind(&self.store, &self.notifier, key, setter)
    }

    /// Keep the converted value of `key` in a lock-free cell.
    ///
    /// # Errors
    ///
    /// Same as [`bind`](Self::bind).
    pub fn bind_value<T: Any + Send + Sync>(&self, key: &str) -> Result<BoundProperty<T>> {
        BoundProperty::new(&self.store, &self.notifier, key)
    }

    /// Reload every configured resource now, in load order.
    ///
    /// Each resource re-applies all of its keys, so after this call the load
    /// order decides overridden keys again. Returns all events posted. A resource that fails to load is logged and
    /// skipped; the others are still applied.
    pub fn reload_all(&self) -> Vec<PropertyChangeEvent> {
        let mut posted = Vec::new();
        for source in self.sources.iter() {
            match self.orchestrator.reload(source.as_ref()) {
                Ok(events) => posted.extend(events),
                Err(e) => {
                    error!(resource = %source.name(), error = %e, "Reload failed, keeping previous values");
                }
            }
        }
        posted
    }

    /// Reload a single resource by name.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ResourceLoadError`] if no configured resource
    /// has that name or if it fails to load.
    pub fn reload_resource(&self, name: &str) -> Result<Vec<PropertyChangeEvent>> {
        let source = self
            .sources
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| PropertyError::load(name, "no such resource"))?;
        self.orchestrator.reload(source.as_ref())
    }

    /// Names of the configured resources, in load order.
    pub fn resources(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// The watch timing this handle was built with.
    pub fn watch_options(&self) -> WatchOptions {
        self.options
    }

    /// Start watching every file-backed resource and return how many are
    /// watched.
    ///
    /// Resources that cannot be watched are logged and skipped. Calling this
    /// while already watching does nothing. Must be called from within a Tokio
    /// runtime.
    #[cfg(feature = "file-watch")]
    pub fn start_watching(&self) -> usize {
        let mut slot = self.watcher.lock();
        if let Some(watcher) = slot.as_ref() {
            return watcher.watching_count();
        }

        let listener: Arc<dyn ResourceListener> = Arc::new(self.orchestrator.clone());
        let watcher = PropertiesWatcher::new(self.sources.to_vec(), self.options, listener);
        let count = watcher.start();
        *slot = Some(watcher);
        count
    }

    /// Stop watching. Idempotent.
    #[cfg(feature = "file-watch")]
    pub fn stop_watching(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.stop();
        }
    }

    /// Returns `true` if at least one resource is being watched.
    #[cfg(feature = "file-watch")]
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .as_ref()
            .is_some_and(|w| w.watching_count() > 0)
    }

    /// Names of the resources currently watched.
    #[cfg(feature = "file-watch")]
    pub fn watched_resources(&self) -> Vec<String> {
        self.watcher
            .lock()
            .as_ref()
            .map(PropertiesWatcher::watched_resources)
            .unwrap_or_default()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<PropertyStore> {
        &self.store
    }

    /// The notifier change events are posted to.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

impl std::fmt::Debug for ReloadableProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadableProperties")
            .field("store", &self.store)
            .field("resources", &self.resources())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
