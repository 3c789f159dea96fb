//! Server configuration - every tunable as a TOML value
//!
//! Each struct implements `Default` with the values from [`super::defaults`],
//! so a missing file or a missing section behaves exactly like the built-in
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::consolidation::{GpsScope, SeverityClassifier};

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "pothole.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,
}

impl ServerConfig {
    /// Load configuration following the documented search order, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_default();
        config.apply_env_overrides();
        config
    }

    fn load_file_or_default() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var("POTHOLE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from POTHOLE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from POTHOLE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "POTHOLE_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./pothole.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply `POTHOLE_SERVER_ADDR`, `POTHOLE_DATA_DIR` and
    /// `CONSOLIDATION_INTERVAL_SECS` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("POTHOLE_SERVER_ADDR").filter(|v| !v.is_empty()) {
            self.server.addr = addr;
        }
        if let Some(dir) = lookup("POTHOLE_DATA_DIR").filter(|v| !v.is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("CONSOLIDATION_INTERVAL_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.consolidation.interval_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid CONSOLIDATION_INTERVAL_SECS"),
            }
        }
    }

    /// Validate all settings for internal consistency.
    ///
    /// Rules:
    /// - Bind address must be non-empty
    /// - Body limit must be > 0
    /// - Severity thresholds must be finite and moderate < severe
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr: must not be empty".to_string());
        }
        if self.server.max_body_bytes == 0 {
            errors.push("server.max_body_bytes: must be > 0".to_string());
        }

        let c = &self.classification;
        if !c.moderate_above.is_finite() || !c.severe_above.is_finite() {
            errors.push(format!(
                "classification: thresholds must be finite (got moderate_above={}, severe_above={})",
                c.moderate_above, c.severe_above
            ));
        } else if c.moderate_above >= c.severe_above {
            errors.push(format!(
                "classification: moderate_above ({:.3}) must be < severe_above ({:.3})",
                c.moderate_above, c.severe_above
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sections
// ============================================================================

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub addr: String,
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
            max_body_bytes: defaults::MAX_BODY_BYTES,
        }
    }
}

/// Artifact storage location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Uploads land in `<data_dir>/Potholes`, consolidated artifacts in
    /// `<data_dir>/Pothole`
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DATA_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Background pass interval; 0 = startup and on-demand only
    pub interval_secs: u64,
    pub gps_scope: GpsScope,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::CONSOLIDATION_INTERVAL_SECS,
            gps_scope: GpsScope::default(),
        }
    }
}

/// Severity tier thresholds (strict lower bounds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub severe_above: f64,
    pub moderate_above: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            severe_above: defaults::SEVERE_PEAK_THRESHOLD,
            moderate_above: defaults::MODERATE_PEAK_THRESHOLD,
        }
    }
}

impl ClassificationConfig {
    pub const fn classifier(&self) -> SeverityClassifier {
        SeverityClassifier::new(self.severe_above, self.moderate_above)
    }
}
