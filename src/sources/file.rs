//! Line-oriented `key=value` property files.

use super::{PropertySource, Snapshot};
use crate::error::{PropertyError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File-based property source.
///
/// Reads a UTF-8 text file of `key=value` lines:
///
/// - blank lines and lines starting with `#` or `!` are ignored
/// - the first `=` or `:` separates key from value
/// - whitespace around the key and before the value is trimmed
/// - a trailing `\` continues the value on the next line
///
/// A non-comment line without a separator, or with an empty key, fails the
/// whole load.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_properties::sources::{PropertiesFile, PropertySource};
///
/// let source = PropertiesFile::new("config/app.properties");
/// let snapshot = source.load()?;
/// # Ok::<(), reloadable_properties::error::PropertyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PropertiesFile {
    path: PathBuf,
}

impl PropertiesFile {
    /// Create a new file source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PropertySource for PropertiesFile {
    fn load(&self) -> Result<Snapshot> {
        let bytes = fs::read(&self.path)
            .map_err(|e| PropertyError::load(self.name(), format!("failed to read file: {}", e)))?;

        let text = String::from_utf8(bytes)
            .map_err(|e| PropertyError::load(self.name(), format!("invalid UTF-8: {}", e)))?;

        parse_properties(&text).map_err(|reason| PropertyError::load(self.name(), reason))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Parse property-file text into a snapshot.
///
/// Returns a description of the first malformed line on failure.
pub fn parse_properties(text: &str) -> std::result::Result<Snapshot, String> {
    let mut entries = BTreeMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let Some(split) = trimmed.find(['=', ':']) else {
            return Err(format!("line {}: missing '=' or ':' separator", index + 1));
        };

        let key = trimmed[..split].trim_end();
        if key.is_empty() {
            return Err(format!("line {}: empty key", index + 1));
        }

        let mut value = trimmed[split + 1..].trim_start().to_string();
        while value.ends_with('\\') {
            value.pop();
            match lines.next() {
                Some((_, next)) => value.push_str(next.trim_start()),
                None => break,
            }
        }

        entries.insert(key.to_string(), value);
    }

    Ok(Snapshot::from(entries))
}
