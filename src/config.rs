//! Build configuration - the static table of namespaces and entry points.
//!
//! ## Example config file (csa-schemas.toml):
//! ```toml
//! base_url = "https://schemas.opengis.net/ogcapi/connected-systems"
//! source_dir = "ogcapi-connected-systems/api"
//! output_dir = "schemas"
//! namespaces = ["common", "sensorml/schemas/json", "swecommon/schemas/json", "part1/sensorml"]
//!
//! [[entry_points]]
//! name = "system.sml"
//! namespace = "part1/sensorml"
//! root = "system.json"
//! output = "system.sml.schema"
//! ```
//!
//! Omitted fields fall back to the defaults, which describe the bundles served
//! by the Connected Systems API.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::CanonicalBase;

/// Configuration of one build run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Prefix of every canonical URI.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory holding one sub-directory per namespace.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Directory the bundles are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Namespaces to normalize, in order.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,

    /// Bundles to produce.
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<EntryPoint>,
}

/// One bundle to produce: namespace, root schema and output file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub namespace: String,
    /// File name inside `namespace`, or an absolute URI.
    pub root: String,
    /// File name inside the output directory.
    pub output: String,
}

impl EntryPoint {
    fn new(name: &str, namespace: &str, root: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            root: root.to_string(),
            output: output.to_string(),
        }
    }

    /// Canonical URI of the root schema.
    pub fn root_uri(&self, base: &CanonicalBase) -> String {
        if self.root.starts_with("http://") || self.root.starts_with("https://") {
            self.root.clone()
        } else {
            base.document_uri(&self.namespace, &self.root)
        }
    }
}

impl BuildConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file can't be read, or
    /// `ConfigError::Parse` if it isn't a valid configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The canonical base built from `base_url`.
    pub fn base(&self) -> CanonicalBase {
        CanonicalBase::new(&self.base_url)
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            namespaces: default_namespaces(),
            entry_points: default_entry_points(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://schemas.opengis.net/ogcapi/connected-systems".to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("ogcapi-connected-systems/api")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_namespaces() -> Vec<String> {
    [
        "common",
        "sensorml/schemas/json",
        "swecommon/schemas/json",
        "part1/geojson",
        "part1/sensorml",
        "part2/json",
    ]
    .iter()
    .map(|ns| ns.to_string())
    .collect()
}

fn default_entry_points() -> Vec<EntryPoint> {
    vec![
        EntryPoint::new("system.sml", "part1/sensorml", "system.json", "system.sml.schema"),
        EntryPoint::new("system.geojson", "part1/geojson", "system.json", "system.geojson.schema"),
        EntryPoint::new("procedure.sml", "part1/sensorml", "procedure.json", "procedure.sml.schema"),
        EntryPoint::new(
            "procedure.geojson",
            "part1/geojson",
            "procedure.json",
            "procedure.geojson.schema",
        ),
        EntryPoint::new(
            "deployment.sml",
            "part1/sensorml",
            "deployment.json",
            "deployment.sml.schema",
        ),
        EntryPoint::new(
            "deployment.geojson",
            "part1/geojson",
            "deployment.json",
            "deployment.geojson.schema",
        ),
        EntryPoint::new("property", "part1/sensorml", "property.json", "property.schema"),
        EntryPoint::new(
            "samplingFeature",
            "part1/geojson",
            "samplingFeature.json",
            "samplingFeature.schema",
        ),
        EntryPoint::new("datastream", "part2/json", "dataStream.json", "datastream.schema"),
        EntryPoint::new("observation", "part2/json", "observation.json", "observation.schema"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_cover_all_bundles() {
        let config = BuildConfig::default();
        assert_eq!(config.entry_points.len(), 10);
        assert_eq!(config.namespaces[0], "common");
        let outputs: Vec<_> = config
            .entry_points
            .iter()
            .map(|e| e.output.as_str())
            .collect();
        assert!(outputs.contains(&"system.sml.schema"));
        assert!(outputs.contains(&"observation.schema"));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = BuildConfig::from_toml(r#"base_url = "https://example.org/csa/""#).unwrap();
        assert_eq!(config.base().as_str(), "https://example.org/csa");
        assert_eq!(config.output_dir, PathBuf::from("schemas"));
        assert_eq!(config.entry_points.len(), 10);
    }

    #[test]
    fn entry_points_from_toml() {
        let config = BuildConfig::from_toml(
            r#"
            namespaces = ["common"]

            [[entry_points]]
            name = "links"
            namespace = "common"
            root = "links.json"
            output = "links.schema"
            "#,
        )
        .unwrap();
        assert_eq!(config.namespaces, vec!["common"]);
        assert_eq!(
            config.entry_points,
            vec![EntryPoint::new("links", "common", "links.json", "links.schema")]
        );
    }

    #[test]
    fn root_uri_relative_and_absolute() {
        let base = CanonicalBase::new("https://example.org/csa");
        let entry = EntryPoint::new("system", "part1/sensorml", "system.json", "s.schema");
        assert_eq!(
            entry.root_uri(&base),
            "https://example.org/csa/part1/sensorml/system.json"
        );

        let entry = EntryPoint::new(
            "ext",
            "part1/sensorml",
            "https://example.org/other/system.json",
            "s.schema",
        );
        assert_eq!(entry.root_uri(&base), "https://example.org/other/system.json");
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "namespaces = 3").unwrap();

        let result = BuildConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn load_missing_file() {
        let result = BuildConfig::load(Path::new("/nonexistent/csa-schemas.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
