//! Runtime configuration.
//!
//! Every field has a default, so a configuration file only needs the keys it
//! changes:
//!
//! ```yaml
//! validation_level: strict
//! platform: libreoffice
//! accessibility: true
//! audit_log: /var/log/kumquat/audit.jsonl
//! ```

use crate::carrier::{InjectionOptions, Platform};
use crate::common::unit::{DEFAULT_BASE_POINTS, DEFAULT_BASELINE_GRID, DEFAULT_DPI};
use crate::opc::Compression;
use crate::patch::ValidationLevel;
use crate::tokens::ResolutionContext;
use crate::transaction::TransactionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub validation_level: ValidationLevel,
    pub dpi: u32,
    pub base_font_pt: f64,
    pub baseline_grid_emu: i64,
    pub snap_to_baseline: bool,
    pub platform: Platform,
    pub accessibility: bool,
    pub min_contrast_ratio: f64,
    /// JSON-lines file that audit records are appended to
    pub audit_log: Option<PathBuf>,
    /// Zero-node targets fail instead of warning
    pub require_matches: bool,
    /// Compression for parts rewritten on save
    pub compression: Compression,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validation_level: ValidationLevel::default(),
            dpi: DEFAULT_DPI,
            base_font_pt: DEFAULT_BASE_POINTS,
            baseline_grid_emu: DEFAULT_BASELINE_GRID,
            snap_to_baseline: false,
            platform: Platform::default(),
            accessibility: false,
            min_contrast_ratio: 4.5,
            audit_log: None,
            require_matches: false,
            compression: Compression::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_saphyr::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dpi == 0 {
            return Err(ConfigError::Invalid("dpi must be positive".into()));
        }
        if !(self.base_font_pt > 0.0) {
            return Err(ConfigError::Invalid("base_font_pt must be positive".into()));
        }
        if self.baseline_grid_emu <= 0 {
            return Err(ConfigError::Invalid("baseline_grid_emu must be positive".into()));
        }
        if !(1.0..=21.0).contains(&self.min_contrast_ratio) {
            return Err(ConfigError::Invalid("min_contrast_ratio must be between 1 and 21".into()));
        }
        Ok(())
    }

    pub fn resolution_context(&self) -> ResolutionContext {
        ResolutionContext {
            base_font_pt: self.base_font_pt,
            dpi: self.dpi,
            ..Default::default()
        }
    }

    pub fn injection_options(&self) -> InjectionOptions {
        InjectionOptions {
            platform: self.platform,
            base_font_pt: self.base_font_pt,
            dpi: self.dpi,
            snap_to_baseline: self.snap_to_baseline,
            baseline_grid_emu: self.baseline_grid_emu,
            accessibility: self.accessibility,
            min_contrast_ratio: self.min_contrast_ratio,
        }
    }

    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            require_matches: self.require_matches,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.validation_level, ValidationLevel::Lenient);
        assert_eq!(config.dpi, 96);
        assert_eq!(config.baseline_grid_emu, 360);
        assert_eq!(config.platform, Platform::Office);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            "validation_level: strict\nplatform: google_workspace\naccessibility: true\ncompression: stored\n",
        )
        .unwrap();
        assert_eq!(config.validation_level, ValidationLevel::Strict);
        assert_eq!(config.platform, Platform::GoogleWorkspace);
        assert!(config.injection_options().accessibility);
        assert_eq!(config.compression, Compression::Stored);
        assert_eq!(config.base_font_pt, 12.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_yaml("dpi: 0\n").is_err());
        assert!(Config::from_yaml("min_contrast_ratio: 40\n").is_err());
        assert!(Config::from_yaml("colour: blue\n").is_err());
        assert!(matches!(
            Config::load("/nonexistent/kumquat.yaml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kumquat.yaml");
        std::fs::write(&path, "dpi: 72\nrequire_matches: true\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.dpi, 72);
        assert!(config.transaction_options().require_matches);
    }
}
