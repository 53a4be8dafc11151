//! Registry configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! program: deploy
//! allow_undefined: false
//! merge_globals: true
//! env_prefix: DEPLOY_
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use argflags_core::ParserSettings;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings of one [`FlagRegistry`](crate::FlagRegistry).
///
/// # Examples
///
/// ```
/// use argflags::RegistryConfig;
///
/// let config: RegistryConfig = serde_yaml::from_str("program: deploy\nmerge_globals: false\n").unwrap();
/// assert_eq!(config.parser.program, "deploy");
/// assert!(!config.merge_globals);
/// assert_eq!(config.env_prefix, "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    #[serde(flatten)]
    pub parser: ParserSettings,
    /// Fold global flags and their environment entries into every pass.
    pub merge_globals: bool,
    /// Prefix an environment key carries in front of a global flag name.
    pub env_prefix: String,
}

impl RegistryConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            parser: ParserSettings::new(program),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::FlagError::IoError) if the file cannot be
    /// read, or [`YamlError`](crate::FlagError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Writes the configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::FlagError::IoError) if the file cannot be
    /// created, or [`YamlError`](crate::FlagError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            parser: ParserSettings::default(),
            merge_globals: true,
            env_prefix: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: RegistryConfig = serde_yaml::from_str("env_prefix: APP_\n").unwrap();
        assert_eq!(config.parser, ParserSettings::default());
        assert!(config.merge_globals);
        assert_eq!(config.env_prefix, "APP_");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.yml");

        let mut config = RegistryConfig::new("deploy");
        config.parser.allow_undefined = true;
        config.env_prefix = "DEPLOY_".into();
        config.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("program: deploy"));
        assert_eq!(RegistryConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegistryConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, crate::FlagError::IoError(_)));
    }
}
