//! Loading of the YAML companion files (`regions.yaml`, `subscribers.yaml`).

use std::{collections::HashSet, fs, path::PathBuf};

use config::{Config, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Error when reading the configuration file.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error when parsing the configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Error when the configuration format is unsupported.
    #[error("Unsupported configuration format")]
    UnsupportedFormat,

    /// An item parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Two items share the same identifier.
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
}

/// A generic loader for YAML files holding a list under a top-level key.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new `ConfigLoader`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the list stored under `key` (e.g. "regions").
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.is_yaml_file() {
            return Err(LoaderError::UnsupportedFormat);
        }

        let content = fs::read_to_string(&self.path)?;
        let config =
            Config::builder().add_source(File::from_str(&content, FileFormat::Yaml)).build()?;

        Ok(config.get(key)?)
    }

    fn is_yaml_file(&self) -> bool {
        matches!(self.path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"))
    }
}

/// A type that can be loaded as a list from a YAML file.
pub trait Loadable: Sized + DeserializeOwned {
    /// The top-level key in the YAML file.
    const KEY: &'static str;

    /// The specific error type for this loadable item.
    type Error: From<LoaderError>;

    /// Identifier that must be unique within one file.
    fn id(&self) -> &str;

    /// Post-deserialization checks. Defaults to accepting the item.
    fn validate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Loads and validates every item of a `Loadable` file, rejecting duplicate
/// identifiers.
pub fn load_config<T: Loadable>(path: PathBuf) -> Result<Vec<T>, T::Error> {
    let loader = ConfigLoader::new(path);
    let mut items: Vec<T> = loader.load(T::KEY)?;

    let mut seen = HashSet::new();
    for item in &mut items {
        item.validate()?;
        if !seen.insert(item.id().to_string()) {
            return Err(LoaderError::DuplicateId { kind: T::KEY, id: item.id().to_string() }.into());
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;
    use crate::models::{Channel, Region, Severity, Subscriber};

    fn create_test_file(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
        let path = dir.path().join(filename);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_load_regions() {
        let dir = TempDir::new().unwrap();
        let content = r#"
regions:
  - id: "nairobi"
    name: "Nairobi"
    center: { lat: -1.2921, lon: 36.8219 }
    radius_km: 25.0
  - id: "turkana"
    name: "Turkana"
"#;
        let path = create_test_file(&dir, "regions.yaml", content);
        let regions: Vec<Region> = load_config(path).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, "nairobi");
        assert_eq!(regions[0].radius_km, Some(25.0));
        assert!(regions[1].center.is_none());
    }

    #[test]
    fn test_load_subscribers() {
        let dir = TempDir::new().unwrap();
        let content = r#"
subscribers:
  - id: "farmer-001"
    location: { lat: -1.30, lon: 36.80 }
    phone_number: "+254700000001"
    channels: [web, sms]
  - id: "farmer-002"
    region_id: "turkana"
    min_severity: high
"#;
        let path = create_test_file(&dir, "subscribers.yaml", content);
        let subscribers: Vec<Subscriber> = load_config(path).unwrap();

        assert_eq!(subscribers.len(), 2);
        assert_eq!(subscribers[0].channels, vec![Channel::Web, Channel::Sms]);
        assert_eq!(subscribers[1].channels, vec![Channel::Web]);
        assert_eq!(subscribers[1].min_severity, Severity::High);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let content = r#"
regions:
  - id: "nairobi"
    name: "Nairobi"
  - id: "nairobi"
    name: "Nairobi again"
"#;
        let path = create_test_file(&dir, "regions.yaml", content);
        let result: Result<Vec<Region>, _> = load_config(path);
        assert!(matches!(result, Err(LoaderError::DuplicateId { kind: "regions", .. })));
    }

    #[test]
    fn test_invalid_region_is_rejected() {
        let dir = TempDir::new().unwrap();
        let content = r#"
regions:
  - id: "nowhere"
    name: "Nowhere"
    center: { lat: 123.0, lon: 36.0 }
    radius_km: 10.0
"#;
        let path = create_test_file(&dir, "regions.yaml", content);
        let result: Result<Vec<Region>, _> = load_config(path);
        assert!(matches!(result, Err(LoaderError::ValidationError(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(dir.path().join("missing.yaml"));
        let result: Result<Vec<Region>, _> = loader.load("regions");
        assert!(matches!(result.unwrap_err(), LoaderError::IoError(_)));
    }

    #[test]
    fn test_load_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "regions.txt", "regions: []");
        let result: Result<Vec<Region>, _> = ConfigLoader::new(path).load("regions");
        assert!(matches!(result.unwrap_err(), LoaderError::UnsupportedFormat));
    }

    #[test]
    fn test_load_missing_top_level_key() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(&dir, "regions.yaml", "areas:\n  - id: x\n    name: X");
        let result: Result<Vec<Region>, _> = ConfigLoader::new(path).load("regions");
        assert!(matches!(result.unwrap_err(), LoaderError::ParseError(_)));
    }
}
