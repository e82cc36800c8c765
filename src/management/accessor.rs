//! The property operations exposed to management callers.

use crate::core::ReloadableProperties;
use crate::error::Result;
use crate::sources::Snapshot;

/// Read/write access to properties for out-of-process callers.
///
/// Implementations delegate to the property store and keep its error
/// semantics: unknown keys fail with
/// [`PropertyError::PropertyNotFound`](crate::error::PropertyError::PropertyNotFound)
/// on both get and set.
pub trait PropertyAccessor: Send + Sync {
    /// Raw value of `key`.
    fn get_property(&self, key: &str) -> Result<String>;

    /// Replace the value of a known key. Returns `true` if the value changed.
    fn set_property(&self, key: &str, value: &str) -> Result<bool>;

    /// Value of `key` with any expression evaluated.
    fn get_parsed_property(&self, key: &str) -> Result<String>;

    /// Every key and value.
    fn list_properties(&self) -> Snapshot;
}

impl PropertyAccessor for ReloadableProperties {
    fn get_property(&self, key: &str) -> Result<String> {
        ReloadableProperties::get_property(self, key)
    }

    fn set_property(&self, key: &str, value: &str) -> Result<bool> {
        ReloadableProperties::set_property(self, key, value).map(|event| event.is_some())
    }

    fn get_parsed_property(&self, key: &str) -> Result<String> {
        self.get_evaluated_property(key)
    }

    fn list_properties(&self) -> Snapshot {
        ReloadableProperties::list_properties(self)
    }
}
