//! String-keyed configuration lookup.
//!
//! The daemon core only ever asks the configuration for a value by key and
//! treats the empty string as "unset". The file format is TOML:
//!
//! ```toml
//! [global]
//! PORT = 2121
//! BIND_TO_ADDR = "any"
//! RESOLVE_CLIENT_IP = true
//! ```
//!
//! Scalars at the top level are accepted too; keys under `[global]` win.
//! Other tables (user and group sections) belong to the login collaborator
//! and are ignored here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::error::{ConfigError, ConfigResult};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ftpd/ftpd.toml";

/// Name of the table holding the daemon-wide options.
const GLOBAL_SECTION: &str = "global";

/// Loaded configuration: a flat map of option names to string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    options: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl Config {
    /// Creates an empty configuration (every option unset).
    ///
    /// Used when the operator runs without a config file.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let mut config = Self::parse(&text)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mut options = BTreeMap::new();
        let mut global = None;

        for (key, value) in &table {
            match value {
                Value::Table(section) if key == GLOBAL_SECTION => global = Some(section),
                Value::Table(_) => {}
                scalar => {
                    options.insert(key.clone(), scalar_to_string(key, scalar)?);
                }
            }
        }

        if let Some(section) = global {
            for (key, value) in section {
                options.insert(key.clone(), scalar_to_string(key, value)?);
            }
        }

        Ok(Self {
            options,
            source: None,
        })
    }

    /// Returns the value of `key`, or the empty string if it is unset.
    pub fn get_option(&self, key: &str) -> &str {
        self.options.get(key).map(String::as_str).unwrap_or("")
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Returns the file this configuration was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Returns the number of options set.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns true if no option is set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Flattens a TOML scalar into the string form the lookup hands out.
fn scalar_to_string(key: &str, value: &Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(true) => Ok("yes".to_string()),
        Value::Boolean(false) => Ok("no".to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        Value::Array(_) | Value::Table(_) => Err(ConfigError::invalid(
            key,
            value.to_string(),
            "expected a string, number or boolean",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_returns_empty_strings() {
        let config = Config::empty();
        assert_eq!(config.get_option("PORT"), "");
        assert!(config.is_empty());
        assert!(config.source().is_none());
    }

    #[test]
    fn test_parse_global_section() {
        let config = Config::parse(
            r#"
            [global]
            PORT = 2121
            BIND_TO_ADDR = "127.0.0.1"
            RESOLVE_CLIENT_IP = true
            "#,
        )
        .unwrap();

        assert_eq!(config.get_option("PORT"), "2121");
        assert_eq!(config.get_option("BIND_TO_ADDR"), "127.0.0.1");
        assert_eq!(config.get_option("RESOLVE_CLIENT_IP"), "yes");
        assert_eq!(config.len(), 3);
    }

    #[test]
    fn test_global_overrides_top_level() {
        let config = Config::parse(
            r#"
            PORT = 21
            HELLO_STRING = "top"

            [global]
            PORT = 2121
            "#,
        )
        .unwrap();

        assert_eq!(config.get_option("PORT"), "2121");
        assert_eq!(config.get_option("HELLO_STRING"), "top");
    }

    #[test]
    fn test_other_tables_ignored() {
        let config = Config::parse(
            r#"
            [global]
            PORT = 21

            [user.anonymous]
            ROOTDIR = "/srv/ftp"
            "#,
        )
        .unwrap();

        assert_eq!(config.get_option("ROOTDIR"), "");
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_false_maps_to_no() {
        let config = Config::parse("[global]\nRESOLVE_CLIENT_IP = false\n").unwrap();
        assert_eq!(config.get_option("RESOLVE_CLIENT_IP"), "no");
    }

    #[test]
    fn test_array_value_rejected() {
        let err = Config::parse("[global]\nPORT = [21, 22]\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = Config::parse("[global\nPORT = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ftpd.toml");
        fs::write(&path, "[global]\nCONTROL_TIMEOUT = 60\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.get_option("CONTROL_TIMEOUT"), "60");
        assert_eq!(config.source(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_set_option() {
        let mut config = Config::empty();
        config.set_option("PORT", "2121");
        assert_eq!(config.get_option("PORT"), "2121");
    }
}
