//! Coordinator configuration via `unitwork.toml`
//!
//! The config file is read once when the coordinator is built. To change
//! settings, edit the file and rebuild the coordinator.

use serde::{Deserialize, Serialize};
use std::path::Path;
use unitwork_core::{AmbientPolicy, TxnError, TxnResult};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "unitwork.toml";

/// Coordinator configuration loaded from `unitwork.toml`.
///
/// # Example
///
/// ```toml
/// # Ambient policy for new contexts: "requires_new" (default) or "not_supported"
/// ambient_policy = "requires_new"
///
/// # Set to false to ignore any configured ambient transaction manager
/// ambient_integration = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Policy given to contexts created by the coordinator.
    #[serde(default)]
    pub ambient_policy: AmbientPolicy,
    /// Whether a configured ambient manager is used at all.
    #[serde(default = "default_ambient_integration")]
    pub ambient_integration: bool,
}

fn default_ambient_integration() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ambient_policy: AmbientPolicy::default(),
            ambient_integration: default_ambient_integration(),
        }
    }
}

impl CoordinatorConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# unitwork coordinator configuration
#
# Ambient policy for new transaction contexts:
#   "requires_new"  = begin a fresh ambient transaction per unit of work,
#                     suspending and later resuming any existing one (default)
#   "not_supported" = never touch the ambient transaction manager
ambient_policy = "requires_new"

# Set to false to ignore a configured ambient transaction manager entirely.
ambient_integration = true
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `TxnError::Config` if the text is not valid TOML or names an
    /// unknown policy.
    pub fn from_toml_str(content: &str) -> TxnResult<Self> {
        toml::from_str(content)
            .map_err(|e| TxnError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> TxnResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TxnError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            TxnError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> TxnResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                TxnError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> TxnResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TxnError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            TxnError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.ambient_policy, AmbientPolicy::RequiresNew);
        assert!(config.ambient_integration);
    }

    #[test]
    fn default_toml_parses_to_default_config() {
        let config = CoordinatorConfig::from_toml_str(CoordinatorConfig::default_toml()).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = CoordinatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn parse_not_supported_policy() {
        let config = CoordinatorConfig::from_toml_str(
            "ambient_policy = \"not_supported\"\nambient_integration = false\n",
        )
        .unwrap();
        assert_eq!(config.ambient_policy, AmbientPolicy::NotSupported);
        assert!(!config.ambient_integration);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = CoordinatorConfig::from_toml_str("ambient_policy = \"mandatory\"").unwrap_err();
        assert!(matches!(err, TxnError::Config(_)));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        CoordinatorConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = CoordinatorConfig::from_file(&path).unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn write_default_if_missing_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "ambient_policy = \"not_supported\"\n").unwrap();

        CoordinatorConfig::write_default_if_missing(&path).unwrap();

        let config = CoordinatorConfig::from_file(&path).unwrap();
        assert_eq!(config.ambient_policy, AmbientPolicy::NotSupported);
    }

    #[test]
    fn write_to_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = CoordinatorConfig {
            ambient_policy: AmbientPolicy::NotSupported,
            ambient_integration: false,
        };

        config.write_to_file(&path).unwrap();
        assert_eq!(CoordinatorConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CoordinatorConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
