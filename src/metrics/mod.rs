//! OpenTelemetry metrics for property reloads.
//!
//! Tracks reload attempts, successes and failures per resource, how long each
//! reload took, how many keys it changed, and direct sets.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reloadable_properties::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let properties = ReloadableProperties::builder()
//!     .with_file("app.properties")
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod reload_metrics;

pub use reload_metrics::ReloadMetrics;
