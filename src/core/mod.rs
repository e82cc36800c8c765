//! Core property management types.

mod binding;
mod builder;
mod loader;
mod options;
mod properties;
mod reload;
mod store;

pub use binding::BoundProperty;
pub use builder::ReloadablePropertiesBuilder;
pub use options::{DEFAULT_CHECK_INTERVAL, DEFAULT_DEBOUNCE, WatchOptions};
pub use properties::ReloadableProperties;
pub use reload::{ReloadOrchestrator, ResourceListener};
pub use store::{MAX_RESOLUTION_DEPTH, PropertyStore};
