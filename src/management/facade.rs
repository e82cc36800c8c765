//! Transport-neutral request handling.

use super::PropertyAccessor;
use crate::error::PropertyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A management operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ManagementRequest {
    /// Read a raw value
    Get {
        /// Property key
        key: String,
    },
    /// Replace a value
    Set {
        /// Property key
        key: String,
        /// New raw value
        value: String,
    },
    /// Read a value with expressions evaluated
    GetParsed {
        /// Property key
        key: String,
    },
    /// Read every key and value
    List,
}

/// Outcome of a [`ManagementRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManagementResponse {
    /// Value of the requested key
    Value {
        /// Property key
        key: String,
        /// Raw or evaluated value
        value: String,
    },
    /// Result of a set
    Updated {
        /// Property key
        key: String,
        /// `false` if the value was already current
        changed: bool,
    },
    /// Every key and value
    Properties {
        /// Key to raw value, sorted by key
        properties: BTreeMap<String, String>,
    },
    /// The operation failed
    Error {
        /// Error category, such as `property_not_found`
        kind: String,
        /// Human-readable description
        message: String,
    },
}

impl From<PropertyError> for ManagementResponse {
    fn from(error: PropertyError) -> Self {
        let kind = match &error {
            PropertyError::PropertyNotFound(_) => "property_not_found",
            PropertyError::ConversionError { .. } => "conversion_error",
            PropertyError::ResourceLoadError { .. } => "resource_load_error",
            PropertyError::WatchSetupError { .. } => "watch_setup_error",
            PropertyError::ResolutionError { .. } => "resolution_error",
        };
        Self::Error {
            kind: kind.to_string(),
            message: error.to_string(),
        }
    }
}

/// Serves [`ManagementRequest`]s against a [`PropertyAccessor`].
///
/// The façade adds no rules of its own; errors of the accessor are returned as
/// [`ManagementResponse::Error`]. Embedding applications expose it over
/// whatever channel they use (HTTP, an admin socket, a CLI).
///
/// # Examples
///
/// ```rust
/// use reloadable_properties::prelude::*;
/// use reloadable_properties::management::{ManagementFacade, ManagementRequest, ManagementResponse};
/// use std::sync::Arc;
///
/// let properties = ReloadableProperties::new([("port", "80")].into_iter().collect());
/// let facade = ManagementFacade::new(Arc::new(properties));
///
/// let response = facade.handle(ManagementRequest::Get { key: "port".into() });
/// assert_eq!(
///     response,
///     ManagementResponse::Value { key: "port".into(), value: "80".into() }
/// );
/// ```
#[derive(Clone)]
pub struct ManagementFacade {
    accessor: Arc<dyn PropertyAccessor>,
}

impl ManagementFacade {
    /// Create a façade over `accessor`.
    pub fn new(accessor: Arc<dyn PropertyAccessor>) -> Self {
        Self { accessor }
    }

    /// Execute one request.
    pub fn handle(&self, request: ManagementRequest) -> ManagementResponse {
        debug!(?request, "Management request");
        match request {
            ManagementRequest::Get { key } => match self.accessor.get_property(&key) {
                Ok(value) => ManagementResponse::Value { key, value },
                Err(e) => e.into(),
            },
            ManagementRequest::Set { key, value } => {
                match self.accessor.set_property(&key, &value) {
                    Ok(changed) => ManagementResponse::Updated { key, changed },
                    Err(e) => e.into(),
                }
            }
            ManagementRequest::GetParsed { key } => {
                match self.accessor.get_parsed_property(&key) {
                    Ok(value) => ManagementResponse::Value { key, value },
                    Err(e) => e.into(),
                }
            }
            ManagementRequest::List => ManagementResponse::Properties {
                properties: self.accessor.list_properties().into_inner(),
            },
        }
    }

    /// Execute a JSON-encoded request and return the JSON-encoded response.
    ///
    /// Malformed requests yield an `invalid_request` error response.
    #[cfg(feature = "json")]
    pub fn handle_json(&self, request: &str) -> String {
        let response = match serde_json::from_str::<ManagementRequest>(request) {
            Ok(request) => self.handle(request),
            Err(e) => ManagementResponse::Error {
                kind: "invalid_request".to_string(),
                message: e.to_string(),
            },
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","kind":"serialization_error","message":{:?}}}"#,
                e.to_string()
            )
        })
    }
}

impl std::fmt::Debug for ManagementFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementFacade").finish_non_exhaustive()
    }
}
