//! Property source implementations.

mod file;
mod property_source;
mod snapshot;

pub use file::{PropertiesFile, parse_properties};
pub use property_source::PropertySource;
pub use snapshot::Snapshot;
