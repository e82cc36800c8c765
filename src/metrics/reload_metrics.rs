//! Reload metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for property reloads.
///
/// Every instrument carries a `resource` attribute naming the reloaded source.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_properties::metrics::ReloadMetrics;
/// use opentelemetry::global;
///
/// let metrics = ReloadMetrics::new(global::meter("reloadable-properties"));
///
/// let timer = metrics.start_reload("file:app.properties");
/// // ... reload ...
/// metrics.record_reload_success("file:app.properties", timer, 3);
/// ```
#[derive(Clone)]
pub struct ReloadMetrics {
    reload_attempts: Counter<u64>,
    reload_success: Counter<u64>,
    reload_failures: Counter<u64>,
    reload_duration: Histogram<f64>,
    changed_keys: Counter<u64>,
    direct_sets: Counter<u64>,
}

impl ReloadMetrics {
    /// Create a collector registering its instruments on `meter`.
    pub fn new(meter: Meter) -> Self {
        Self {
            reload_attempts: meter
                .u64_counter("reloadable_properties.reload.attempts")
                .with_description("Total number of reload attempts")
                .build(),
            reload_success: meter
                .u64_counter("reloadable_properties.reload.success")
                .with_description("Number of successful reloads")
                .build(),
            reload_failures: meter
                .u64_counter("reloadable_properties.reload.failures")
                .with_description("Number of reloads that failed to load the resource")
                .build(),
            reload_duration: meter
                .f64_histogram("reloadable_properties.reload.duration")
                .with_description("Duration of reload operations in seconds")
                .with_unit("s")
                .build(),
            changed_keys: meter
                .u64_counter("reloadable_properties.keys.changed")
                .with_description("Number of keys changed by reloads")
                .build(),
            direct_sets: meter
                .u64_counter("reloadable_properties.set.applied")
                .with_description("Number of direct sets that changed a value")
                .build(),
        }
    }

    /// Count a reload attempt and return its start time.
    pub fn start_reload(&self, resource: &str) -> Instant {
        self.reload_attempts.add(1, &attributes(resource));
        Instant::now()
    }

    /// Record a reload that applied `changed` keys.
    pub fn record_reload_success(&self, resource: &str, start: Instant, changed: usize) {
        let attrs = attributes(resource);
        self.reload_success.add(1, &attrs);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &attrs);
        self.changed_keys.add(changed as u64, &attrs);
    }

    /// Record a reload whose resource failed to load.
    pub fn record_reload_failure(&self, resource: &str, start: Instant) {
        let attrs = attributes(resource);
        self.reload_failures.add(1, &attrs);
        self.reload_duration.record(start.elapsed().as_secs_f64(), &attrs);
    }

    /// Record a direct set that changed a value.
    pub fn record_set(&self) {
        self.direct_sets.add(1, &[]);
    }
}

fn attributes(resource: &str) -> [KeyValue; 1] {
    [KeyValue::new("resource", resource.to_string())]
}
