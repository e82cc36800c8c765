//! Change notification and resource watching.
//!
//! [`ChangeNotifier`] fans [`PropertyChangeEvent`]s out to subscribers. With the
//! `file-watch` feature, [`PropertiesWatcher`] observes property files and
//! triggers reloads when their content changes.

mod event;
mod notifier;

#[cfg(feature = "file-watch")]
mod watcher;

pub use event::PropertyChangeEvent;
pub use notifier::{ChangeNotifier, HandlerResult, SubscriptionHandle};

#[cfg(feature = "file-watch")]
pub use watcher::{PropertiesWatcher, ResourceWatcher};
