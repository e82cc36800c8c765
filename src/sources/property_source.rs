//! Property source trait.

use super::Snapshot;
use crate::error::Result;
use std::path::Path;

/// A backing resource that can be loaded into a [`Snapshot`].
///
/// Implement this trait to feed properties from somewhere other than a file
/// on disk (an in-memory map in tests, a blob fetched at startup, ...).
/// Only sources that report a [`path`](PropertySource::path) can be watched.
pub trait PropertySource: Send + Sync {
    /// Load the full content of the resource.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ResourceLoadError`](crate::error::PropertyError::ResourceLoadError)
    /// if the resource cannot be read or parsed. A failed load never yields a
    /// partial snapshot.
    fn load(&self) -> Result<Snapshot>;

    /// Human-readable name of this source (for logging and error messages).
    fn name(&self) -> String;

    /// Location on disk, if the source is file-backed.
    fn path(&self) -> Option<&Path> {
        None
    }
}
