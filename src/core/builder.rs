//! Builder for constructing ReloadableProperties instances.

use crate::convert::{ExpressionEvaluator, ValueConverter};
use crate::core::loader::PropertyLoader;
use crate::core::{PropertyStore, ReloadableProperties, WatchOptions};
use crate::error::Result;
use crate::sources::{PropertiesFile, PropertySource};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[cfg(feature = "metrics")]
use crate::metrics::ReloadMetrics;

/// Builder for a [`ReloadableProperties`] handle.
///
/// Resources are loaded in the order they were added; later resources override
/// keys of earlier ones. The override order only applies to the initial load.
/// When an earlier resource is reloaded, its values replace the current ones,
/// even for keys that a later resource overrode.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_properties::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let properties = ReloadableProperties::builder()
///     .with_file("config/default.properties")
///     .with_file("config/production.properties")
///     .with_debounce(Duration::from_secs(2))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ReloadablePropertiesBuilder {
    sources: Vec<Arc<dyn PropertySource>>,
    options: WatchOptions,
    converter: ValueConverter,
    ignore_unloadable: bool,
    #[cfg(feature = "metrics")]
    metrics: Option<ReloadMetrics>,
}

impl ReloadablePropertiesBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            options: WatchOptions::default(),
            converter: ValueConverter::new(),
            ignore_unloadable: false,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a property file.
    pub fn with_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(PropertiesFile::new(path))
    }

    /// Add a custom property source.
    ///
    /// Sources without a backing file are loaded and reloaded on demand but
    /// never watched.
    pub fn with_source<S: PropertySource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Set how long a changed resource must stay quiet before it is reloaded.
    ///
    /// Defaults to 10 seconds.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.options.debounce = debounce;
        self
    }

    /// Set how often file metadata is checked for changes.
    ///
    /// Defaults to 1 second.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.options.check_interval = interval;
        self
    }

    /// Replace the value converter.
    pub fn with_converter(mut self, converter: ValueConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Evaluate `#{ ... }` expressions with `evaluator`.
    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.converter = self.converter.with_evaluator(evaluator);
        self
    }

    /// Register a conversion rule for `T`.
    ///
    /// The rule returns `None` when the input is not a literal of `T`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use reloadable_properties::prelude::*;
    ///
    /// #[derive(Debug)]
    /// enum Level { Low, High }
    ///
    /// # fn example() -> Result<()> {
    /// let properties = ReloadableProperties::builder()
    ///     .with_file("app.properties")
    ///     .with_conversion_rule(|raw: &str| match raw {
    ///         "low" => Some(Level::Low),
    ///         "high" => Some(Level::High),
    ///         _ => None,
    ///     })
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_conversion_rule<T, F>(mut self, rule: F) -> Self
    where
        T: Any + Send,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        self.converter = self.converter.with_rule(rule);
        self
    }

    /// Skip resources that fail to load instead of failing the build.
    pub fn ignore_unloadable_resources(mut self, ignore: bool) -> Self {
        self.ignore_unloadable = ignore;
        self
    }

    /// Record reload metrics on `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(ReloadMetrics::new(meter));
        self
    }

    /// Load every resource and build the handle.
    ///
    /// Watching is not started; call
    /// [`start_watching`](ReloadableProperties::start_watching) for that.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::ResourceLoadError`](crate::error::PropertyError::ResourceLoadError)
    /// if no resource was added, or if a resource fails to load and
    /// [`ignore_unloadable_resources`](Self::ignore_unloadable_resources) is
    /// not set.
    pub fn build(self) -> Result<ReloadableProperties> {
        let (initial, loaded) = PropertyLoader::new(self.sources, self.ignore_unloadable).load()?;

        info!(
            resources = loaded.len(),
            keys = initial.len(),
            "Loaded properties"
        );

        let store = PropertyStore::new(initial, self.converter);
        let properties = ReloadableProperties::from_parts(store, loaded, self.options);

        #[cfg(feature = "metrics")]
        let properties = match self.metrics {
            Some(metrics) => properties.with_metrics(metrics),
            None => properties,
        };

        Ok(properties)
    }
}

impl Default for ReloadablePropertiesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
