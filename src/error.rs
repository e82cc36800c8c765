//! Error types for reloadable-properties.

/// Result type alias for reloadable-properties operations.
pub type Result<T> = std::result::Result<T, PropertyError>;

/// Boxed error produced by pluggable collaborators (expression evaluators, change handlers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when reading, converting, reloading or watching properties.
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    /// The key is unknown to the property store.
    #[error("Property {0} not found")]
    PropertyNotFound(String),

    /// A raw value could not be converted to the requested type.
    ///
    /// Expression evaluation failures land here too, with the evaluator's
    /// error attached as the source.
    #[error("Failed to convert '{value}' to {target}: {reason}")]
    ConversionError {
        /// The raw (unconverted) value
        value: String,
        /// Name of the requested type
        target: &'static str,
        /// Human-readable reason
        reason: String,
        /// Underlying evaluator error, if any
        #[source]
        source: Option<BoxError>,
    },

    /// A resource could not be read or parsed.
    #[error("Failed to load resource '{resource}': {reason}")]
    ResourceLoadError {
        /// Name of the resource
        resource: String,
        /// Why loading failed
        reason: String,
    },

    /// The watcher could not attach to a resource's change notifications.
    #[error("Failed to watch resource '{resource}': {reason}")]
    WatchSetupError {
        /// Name of the resource
        resource: String,
        /// Why the watch could not be set up
        reason: String,
    },

    /// An indirect `${...}` reference could not be resolved.
    #[error("Failed to resolve property {key}: reference chain {} does not terminate", .chain.join(" -> "))]
    ResolutionError {
        /// The key whose resolution was requested
        key: String,
        /// The keys visited before giving up
        chain: Vec<String>,
    },
}

impl PropertyError {
    /// Create a conversion error without an underlying source.
    pub fn conversion(
        value: impl Into<String>,
        target: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::ConversionError {
            value: value.into(),
            target,
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a resource load error.
    pub fn load(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceLoadError {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Create a watch setup error.
    pub fn watch_setup(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WatchSetupError {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a [`PropertyError::PropertyNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PropertyNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_not_found_message() {
        let err = PropertyError::PropertyNotFound("db.url".to_string());
        assert_eq!(err.to_string(), "Property db.url not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_conversion_source_is_exposed() {
        let err = PropertyError::ConversionError {
            value: "#{ 1 + }".to_string(),
            target: "i32",
            reason: "expression evaluation failed".to_string(),
            source: Some("unexpected end of expression".into()),
        };
        assert!(err.source().is_some());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_resolution_chain_message() {
        let err = PropertyError::ResolutionError {
            key: "a".to_string(),
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }
}
