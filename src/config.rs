//! Configuration management for the interchange engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (interchange.toml)
//! - Environment variables (INTERCHANGE__*)
//!
//! ## Example config file (interchange.toml):
//! ```toml
//! [codec]
//! default_target = "3.1.0"
//! output = "yaml"
//!
//! [import]
//! on_item_error = "abort"
//! actor = 42
//!
//! [export]
//! inherit_category_tags = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::dialect::DialectVersion;
use crate::error::Result;
use crate::model::ActorId;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterchangeConfig {
    /// Codec settings
    #[serde(default)]
    pub codec: CodecConfig,

    /// Tree import settings
    #[serde(default)]
    pub import: ImportConfig,

    /// Tree export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Codec configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Dialect version produced when none is requested
    #[serde(default = "default_target")]
    pub default_target: String,

    /// Encoded document layout
    #[serde(default)]
    pub output: OutputFormat,
}

/// Output format for encoded documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
    Yaml,
}

/// What the importer does when a single item cannot be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemErrorPolicy {
    /// Skip the item (and its subtree), record it in the report, keep going
    #[default]
    Skip,
    /// Stop the import at the first failure
    Abort,
}

/// Import configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub on_item_error: ItemErrorPolicy,

    /// Actor recorded as creator of imported nodes
    #[serde(default)]
    pub actor: ActorId,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Add the enclosing category's title to each child's tags
    #[serde(default = "default_true")]
    pub inherit_category_tags: bool,
}

// Default value functions
fn default_target() -> String {
    "3.0.1".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            default_target: default_target(),
            output: OutputFormat::Pretty,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            inherit_category_tags: true,
        }
    }
}

impl InterchangeConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "interchange.toml",
            ".interchange.toml",
            "config/interchange.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "apidocs", "interchange") {
            let xdg_config = config_dir.config_dir().join("interchange.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // INTERCHANGE__CODEC__DEFAULT_TARGET=3.1.0
        // No try_parsing: `2.0` must stay a version string, not a float
        builder = builder.add_source(
            Environment::with_prefix("INTERCHANGE")
                .prefix_separator("__")
                .separator("__"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The configured default target, parsed
    pub fn default_target(&self) -> Result<DialectVersion> {
        self.codec.default_target.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InterchangeConfig::default();
        assert_eq!(config.codec.output, OutputFormat::Pretty);
        assert_eq!(config.import.on_item_error, ItemErrorPolicy::Skip);
        assert!(config.export.inherit_category_tags);
        assert_eq!(config.default_target().unwrap(), DialectVersion::OpenApi301);
    }

    #[test]
    fn test_serialize_config() {
        let config = InterchangeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[codec]"));
        assert!(toml_str.contains("[import]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[codec]\ndefault_target = \"2.0\"\noutput = \"yaml\"\n\n[import]\non_item_error = \"abort\"\nactor = 9\n",
        )
        .unwrap();

        let config = InterchangeConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.codec.output, OutputFormat::Yaml);
        assert_eq!(config.import.on_item_error, ItemErrorPolicy::Abort);
        assert_eq!(config.import.actor, 9);
        assert_eq!(config.default_target().unwrap(), DialectVersion::Swagger20);
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = InterchangeConfig::default();
        config.export.inherit_category_tags = false;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = InterchangeConfig::load_from(path.to_str()).unwrap();
        assert!(!loaded.export.inherit_category_tags);
    }

    #[test]
    fn test_save_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("saved.toml");
        let err = InterchangeConfig::default().save(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, crate::error::InterchangeError::Io(_)));
    }

    #[test]
    fn test_env_target_keeps_version_string() {
        std::env::set_var("INTERCHANGE__CODEC__DEFAULT_TARGET", "2.0");
        let loaded = InterchangeConfig::load_from(None);
        std::env::remove_var("INTERCHANGE__CODEC__DEFAULT_TARGET");

        let config = loaded.unwrap();
        assert_eq!(config.codec.default_target, "2.0");
        assert_eq!(config.default_target().unwrap(), DialectVersion::Swagger20);
    }
}
