//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tablemirror_core::{Error, Result, is_valid_identifier};

/// Namespace every SQLite connection has.
pub const MAIN_NAMESPACE: &str = "main";

/// Configuration for opening a [`Store`](crate::Store).
///
/// Deserializable from JSON so applications can keep it next to their other
/// settings; every field has a default, so partial documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Schema namespace substituted for `{NS}`. Anything other than `main` or
    /// `temp` is attached on open.
    pub namespace: String,
    /// File attached under `namespace` when it is not `main`/`temp`.
    /// `None` attaches an in-memory database.
    pub namespace_path: Option<PathBuf>,
    /// Enable SQLite foreign key enforcement.
    pub foreign_keys: bool,
    /// How long a statement waits on a locked database file.
    pub busy_timeout: Duration,
    /// Keep a copy of every executed statement (for tests and diagnostics).
    pub record_statements: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            namespace: MAIN_NAMESPACE.to_string(),
            namespace_path: None,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
            record_statements: false,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with default values (in-memory database).
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// File-backed database.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Custom(format!("invalid store config: {e}")))
    }

    /// Set the database file.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the schema namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the file attached under the namespace.
    pub fn namespace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.namespace_path = Some(path.into());
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Record executed statements.
    pub fn record_statements(mut self, enabled: bool) -> Self {
        self.record_statements = enabled;
        self
    }

    /// True if the namespace has to be attached.
    pub fn needs_attach(&self) -> bool {
        !self.namespace.eq_ignore_ascii_case(MAIN_NAMESPACE)
            && !self.namespace.eq_ignore_ascii_case("temp")
    }

    /// Check the configuration before opening.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.namespace) {
            return Err(Error::argument(format!(
                "namespace `{}` is not a plain identifier",
                self.namespace
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new()
            .path("/tmp/app.db")
            .namespace("aux")
            .foreign_keys(false)
            .busy_timeout(Duration::from_millis(250))
            .record_statements(true);

        assert_eq!(config.path, Some(PathBuf::from("/tmp/app.db")));
        assert_eq!(config.namespace, "aux");
        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert!(config.record_statements);
        assert!(config.needs_attach());
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.path.is_none());
        assert_eq!(config.namespace, "main");
        assert!(config.foreign_keys);
        assert!(!config.needs_attach());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = StoreConfig::from_json(r#"{"namespace": "temp", "record_statements": true}"#)
            .unwrap();
        assert_eq!(config.namespace, "temp");
        assert!(config.record_statements);
        assert!(config.foreign_keys);
        assert!(!config.needs_attach());
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(StoreConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_namespace() {
        let config = StoreConfig::new().namespace("main; DROP TABLE x");
        assert!(matches!(config.validate(), Err(Error::Argument(_))));
    }
}
