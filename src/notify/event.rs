//! Property change events.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single detected change of one property.
///
/// Created once per change by the property store and delivered to every
/// subscriber of the [`ChangeNotifier`](super::ChangeNotifier). Events are
/// fire-and-forget: never retried, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyChangeEvent {
    /// The property key
    pub key: String,
    /// The previous value, `None` if the key was newly defined by a reload
    pub old_value: Option<String>,
    /// The new raw value
    pub new_value: String,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
}

impl PropertyChangeEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        key: impl Into<String>,
        old_value: Option<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value: new_value.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns `true` if the key did not exist before this change.
    pub fn is_addition(&self) -> bool {
        self.old_value.is_none()
    }
}
