//! YAML configuration file access
//!
//! The ETL reads a single YAML file whose top-level keys group related
//! settings (`event_store`, `companies_house`, `etl`). Each consumer asks for
//! its own section and deserializes it into a typed struct.

use crate::error::{QuotesError, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A parsed configuration file
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    root: Mapping,
}

impl ConfigFile {
    /// Read and parse a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            QuotesError::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::parse(&text, path)?;
        debug!(path = %path.display(), keys = config.root.len(), "Loaded configuration file");
        Ok(config)
    }

    /// Parse configuration text; `path` is only used in error messages
    pub fn parse(text: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let root = match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => {
                return Err(QuotesError::config(format!(
                    "Configuration file {} must contain a mapping at the top level",
                    path.display()
                )))
            },
        };

        Ok(Self { path, root })
    }

    /// Path the configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a top-level key is present
    pub fn contains(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    /// Deserialize a required top-level section
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.root.get(key).ok_or_else(|| {
            QuotesError::config(format!(
                "Top level key \"{}\" is not available in the configuration file {}",
                key,
                self.path.display()
            ))
        })?;

        self.decode(key, value.clone())
    }

    /// Deserialize an optional top-level section, falling back to its default
    pub fn section_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.root.get(key) {
            Some(Value::Null) | None => Ok(T::default()),
            Some(value) => self.decode(key, value.clone()),
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, value: Value) -> Result<T> {
        serde_yaml::from_value(value).map_err(|e| {
            QuotesError::config(format!(
                "Invalid \"{}\" section in configuration file {}: {}",
                key,
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
event_store:
  tcp_host: localhost
  tcp_port: 1113
  username: admin
  password: changeit
companies_house:
  url: http://download.companieshouse.gov.uk/
"#;

    #[derive(Debug, Deserialize, PartialEq)]
    struct CompaniesHouse {
        url: String,
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Optional {
        #[serde(default)]
        stream: Option<String>,
    }

    #[test]
    fn test_section_returns_typed_values() {
        let config = ConfigFile::parse(SAMPLE, "config.yaml").unwrap();
        let section: CompaniesHouse = config.section("companies_house").unwrap();
        assert_eq!(section.url, "http://download.companieshouse.gov.uk/");
    }

    #[test]
    fn test_section_as_map() {
        let config = ConfigFile::parse(SAMPLE, "config.yaml").unwrap();
        let section: HashMap<String, String> = config.section("companies_house").unwrap();
        assert_eq!(section.len(), 1);
        assert!(section.contains_key("url"));
    }

    #[test]
    fn test_missing_section_names_key_and_file() {
        let config = ConfigFile::parse(SAMPLE, "config.yaml").unwrap();
        let err = config.section::<CompaniesHouse>("warehouse").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"warehouse\""));
        assert!(msg.contains("config.yaml"));
    }

    #[test]
    fn test_invalid_section_shape() {
        let config = ConfigFile::parse(SAMPLE, "config.yaml").unwrap();
        let err = config.section::<CompaniesHouse>("event_store").unwrap_err();
        assert!(matches!(err, QuotesError::Config(_)));
    }

    #[test]
    fn test_optional_section_defaults() {
        let config = ConfigFile::parse(SAMPLE, "config.yaml").unwrap();
        let section: Optional = config.section_or_default("etl").unwrap();
        assert_eq!(section, Optional::default());
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        assert!(ConfigFile::parse("- a\n- b\n", "config.yaml").is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert!(config.contains("event_store"));
        assert_eq!(config.path(), path.as_path());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, QuotesError::Config(_)));
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }
}
