//! Applying reloaded resources to the store.

use super::PropertyStore;
use crate::error::Result;
use crate::notify::{ChangeNotifier, PropertyChangeEvent};
use crate::sources::{PropertySource, Snapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Receives change signals from resource watchers.
pub trait ResourceListener: Send + Sync {
    /// Called once the content of `source` has settled after a change.
    ///
    /// Returns the snapshot now applied for `source`, or `None` if it could not
    /// be applied. Watchers call this from a blocking thread.
    fn on_resource_changed(&self, source: &dyn PropertySource) -> Option<Snapshot>;

    /// The snapshot last applied for `source`, if known.
    ///
    /// A watcher compares the resource against it when it starts, so a change
    /// made before watching began is still picked up.
    fn applied_snapshot(&self, _source: &dyn PropertySource) -> Option<Snapshot> {
        None
    }
}

/// Loads changed resources, applies them to the [`PropertyStore`] and posts
/// one [`PropertyChangeEvent`] per changed key.
///
/// Every key of the fresh snapshot whose value differs is defined or replaced;
/// keys absent from the snapshot keep their value. All changes of one pass are
/// applied before the first event is posted. A resource that fails to load
/// leaves the store untouched.
///
/// Reloading a resource re-applies all of its keys, including keys that a
/// resource loaded after it overrode at startup.
#[derive(Clone)]
pub struct ReloadOrchestrator {
    store: Arc<PropertyStore>,
    notifier: ChangeNotifier,
    applied: Arc<Mutex<HashMap<String, Snapshot>>>,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
}

impl ReloadOrchestrator {
    /// Create an orchestrator over `store` posting to `notifier`.
    pub fn new(store: Arc<PropertyStore>, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            notifier,
            applied: Arc::new(Mutex::new(HashMap::new())),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Record every reload on `metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: ReloadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Record `snapshot` as the content applied for the resource `name`.
    pub(crate) fn record_applied(&self, name: String, snapshot: Snapshot) {
        self.applied.lock().insert(name, snapshot);
    }

    /// Reload `source` and return the events that were posted.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ResourceLoadError`](crate::error::PropertyError::ResourceLoadError)
    /// if the resource cannot be loaded; nothing is applied in that case.
    pub fn reload(&self, source: &dyn PropertySource) -> Result<Vec<PropertyChangeEvent>> {
        self.reload_pass(source).map(|(_, events)| events)
    }

    fn reload_pass(&self, source: &dyn PropertySource) -> Result<(Snapshot, Vec<PropertyChangeEvent>)> {
        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_reload(&source.name()));

        let snapshot = match source.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_reload_failure(&source.name(), timer);
                }
                return Err(e);
            }
        };

        let events = {
            let mut applied = self.applied.lock();
            let events = self.store.apply_snapshot(&snapshot);
            applied.insert(source.name(), snapshot.clone());
            events
        };

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_reload_success(&source.name(), timer, events.len());
        }

        for event in &events {
            debug!(resource = %source.name(), key = %event.key, "Property reloaded");
        }
        self.notifier.post_all(&events);

        Ok((snapshot, events))
    }
}

impl ResourceListener for ReloadOrchestrator {
    fn on_resource_changed(&self, source: &dyn PropertySource) -> Option<Snapshot> {
        match self.reload_pass(source) {
            Ok((snapshot, events)) => {
                info!(resource = %source.name(), changed = events.len(), "Reloaded resource");
                Some(snapshot)
            }
            Err(e) => {
                error!(resource = %source.name(), error = %e, "Reload failed, keeping previous values");
                None
            }
        }
    }

    fn applied_snapshot(&self, source: &dyn PropertySource) -> Option<Snapshot> {
        self.applied.lock().get(&source.name()).cloned()
    }
}
