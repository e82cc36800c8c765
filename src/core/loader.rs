//! Initial load that merges every configured resource.

use crate::error::{PropertyError, Result};
use crate::sources::{PropertySource, Snapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Loads and merges the initial snapshots of a list of resources.
///
/// Resources are merged in order, so later resources override keys of earlier
/// ones. This holds for the initial load only: a later reload of an earlier
/// resource puts its values back, including for overridden keys.
pub(crate) struct PropertyLoader {
    sources: Vec<Arc<dyn PropertySource>>,
    ignore_unloadable: bool,
}

impl PropertyLoader {
    pub(crate) fn new(sources: Vec<Arc<dyn PropertySource>>, ignore_unloadable: bool) -> Self {
        Self {
            sources,
            ignore_unloadable,
        }
    }

    /// Load every resource and return the merged snapshot together with each
    /// resource that loaded and its own snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ResourceLoadError`] if no resource is
    /// configured, or if one fails to load and unloadable resources are not
    /// ignored.
    pub(crate) fn load(self) -> Result<(Snapshot, Vec<(Arc<dyn PropertySource>, Snapshot)>)> {
        if self.sources.is_empty() {
            return Err(PropertyError::load("<none>", "No property sources specified"));
        }

        let mut merged = BTreeMap::new();
        let mut loaded = Vec::with_capacity(self.sources.len());

        for source in self.sources {
            match source.load() {
                Ok(snapshot) => {
                    debug!(resource = %source.name(), keys = snapshot.len(), "Loaded resource");
                    merged.extend(snapshot.clone());
                    loaded.push((source, snapshot));
                }
                Err(e) if self.ignore_unloadable => {
                    warn!(resource = %source.name(), error = %e, "Skipping unloadable resource");
                }
                Err(e) => return Err(e),
            }
        }

        Ok((Snapshot::from(merged), loaded))
    }
}
