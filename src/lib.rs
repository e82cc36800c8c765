//! # reloadable-properties
//!
//! Live-reloading `key=value` properties with lock-free reads and change events.
//!
//! ## Overview
//!
//! `reloadable-properties` keeps a process's properties in sync with the files
//! they were loaded from:
//! - Lock-free reads of raw or typed values using `arc-swap`
//! - Debounced file watching; one reload per settled change
//! - Whole-pass reloads: subscribers never observe a half-applied file
//! - Typed conversion with `#{ ... }` expression evaluation
//! - Change events fanned out to isolated subscribers
//! - A serializable management façade for get/set/list
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reloadable_properties::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> reloadable_properties::error::Result<()> {
//! let properties = ReloadableProperties::builder()
//!     .with_file("config/app.properties")
//!     .with_debounce(Duration::from_secs(2))
//!     .build()?;
//!
//! let port: u16 = properties.get_parsed_property("server.port")?;
//! let timeout: Duration = properties.get_parsed_property("server.timeout")?;
//! println!("Listening on {} with timeout {:?}", port, timeout);
//!
//! let _handle = properties.subscribe(|event| {
//!     println!("{} changed to {}", event.key, event.new_value);
//!     Ok(())
//! });
//!
//! properties.start_watching();
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): watch property files with `notify` on a Tokio runtime
//! - `json` (default): JSON entry point of the management façade
//! - `metrics`: OpenTelemetry reload metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod convert;
pub mod core;
pub mod error;
pub mod management;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::convert::ValueConverter;
    pub use crate::core::{
        BoundProperty, ReloadableProperties, ReloadablePropertiesBuilder, WatchOptions,
    };
    pub use crate::error::{PropertyError, Result};
    pub use crate::notify::{PropertyChangeEvent, SubscriptionHandle};
    pub use crate::sources::{PropertiesFile, PropertySource, Snapshot};
}
