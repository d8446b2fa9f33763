//! Configuration for the COB/IOB engine.
//!
//! `EngineConfig` holds the model parameters passed to every computation.
//! `Config` is the settings file loaded from `$XDG_CONFIG_HOME/cobctl/config.toml`.

use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Upper bound for any active window (one day)
pub const MAX_DURATION_MINUTES: f64 = 24.0 * 60.0;

/// Upper bound for glucose conversion factors
pub const MAX_GLUCOSE_FACTOR: f64 = 100.0;

// ============================================================================
// Engine Parameters
// ============================================================================

/// Tunable decay-model parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_carb_absorption_minutes")]
    pub carb_absorption_minutes: f64,

    #[serde(default = "default_insulin_action_minutes")]
    pub insulin_action_minutes: f64,

    #[serde(default = "default_carb_peak_minutes")]
    pub carb_peak_minutes: f64,

    #[serde(default = "default_insulin_peak_minutes")]
    pub insulin_peak_minutes: f64,

    /// mmol/L rise per gram of carbs still on board
    #[serde(default = "default_carb_to_glucose_factor")]
    pub carb_to_glucose_factor: f64,

    /// mmol/L drop per unit of insulin still on board
    #[serde(default = "default_insulin_to_glucose_factor")]
    pub insulin_to_glucose_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            carb_absorption_minutes: default_carb_absorption_minutes(),
            insulin_action_minutes: default_insulin_action_minutes(),
            carb_peak_minutes: default_carb_peak_minutes(),
            insulin_peak_minutes: default_insulin_peak_minutes(),
            carb_to_glucose_factor: default_carb_to_glucose_factor(),
            insulin_to_glucose_factor: default_insulin_to_glucose_factor(),
        }
    }
}

fn default_carb_absorption_minutes() -> f64 {
    180.0
}

fn default_insulin_action_minutes() -> f64 {
    240.0
}

fn default_carb_peak_minutes() -> f64 {
    45.0
}

fn default_insulin_peak_minutes() -> f64 {
    75.0
}

fn default_carb_to_glucose_factor() -> f64 {
    0.2
}

fn default_insulin_to_glucose_factor() -> f64 {
    1.0
}

/// Partial update payload; `None` fields keep their current value
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigUpdate {
    pub carb_absorption_minutes: Option<f64>,
    pub insulin_action_minutes: Option<f64>,
    pub carb_peak_minutes: Option<f64>,
    pub insulin_peak_minutes: Option<f64>,
    pub carb_to_glucose_factor: Option<f64>,
    pub insulin_to_glucose_factor: Option<f64>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl EngineConfig {
    /// Longest window over which any entry can still contribute
    pub fn max_active_minutes(&self) -> f64 {
        self.carb_absorption_minutes.max(self.insulin_action_minutes)
    }

    /// Copy of this config with the supplied fields replaced.
    ///
    /// The result is not validated; call [`EngineConfig::validate`] before
    /// committing it anywhere.
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            carb_absorption_minutes: update
                .carb_absorption_minutes
                .unwrap_or(self.carb_absorption_minutes),
            insulin_action_minutes: update
                .insulin_action_minutes
                .unwrap_or(self.insulin_action_minutes),
            carb_peak_minutes: update.carb_peak_minutes.unwrap_or(self.carb_peak_minutes),
            insulin_peak_minutes: update
                .insulin_peak_minutes
                .unwrap_or(self.insulin_peak_minutes),
            carb_to_glucose_factor: update
                .carb_to_glucose_factor
                .unwrap_or(self.carb_to_glucose_factor),
            insulin_to_glucose_factor: update
                .insulin_to_glucose_factor
                .unwrap_or(self.insulin_to_glucose_factor),
        }
    }

    /// Check every positivity and range constraint.
    ///
    /// Returns all violations in one error message.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("carb_absorption_minutes", self.carb_absorption_minutes),
            ("insulin_action_minutes", self.insulin_action_minutes),
        ] {
            check_range(&mut errors, name, value, MAX_DURATION_MINUTES);
        }

        for (name, value, total) in [
            ("carb_peak_minutes", self.carb_peak_minutes, self.carb_absorption_minutes),
            (
                "insulin_peak_minutes",
                self.insulin_peak_minutes,
                self.insulin_action_minutes,
            ),
        ] {
            if check_range(&mut errors, name, value, MAX_DURATION_MINUTES)
                && total.is_finite()
                && total > 0.0
                && value * 2.0 >= total
            {
                errors.push(format!(
                    "{} ({}) must be less than half of its active window ({})",
                    name, value, total
                ));
            }
        }

        for (name, value) in [
            ("carb_to_glucose_factor", self.carb_to_glucose_factor),
            ("insulin_to_glucose_factor", self.insulin_to_glucose_factor),
        ] {
            check_range(&mut errors, name, value, MAX_GLUCOSE_FACTOR);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(errors.join("; ")))
        }
    }
}

fn check_range(errors: &mut Vec<String>, name: &str, value: f64, max: f64) -> bool {
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{} must be a positive number, got {}", name, value));
        false
    } else if value > max {
        errors.push(format!("{} must not exceed {}, got {}", name, max, value));
        false
    } else {
        true
    }
}

// ============================================================================
// Settings File
// ============================================================================

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: EngineConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub data: DataConfig,
}

/// Default projection window for charting
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default = "default_projection_steps")]
    pub steps: i64,

    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            steps: default_projection_steps(),
            step_minutes: default_step_minutes(),
        }
    }
}

/// Data location configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_entries_path")]
    pub entries_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            entries_path: default_entries_path(),
        }
    }
}

// 24 x 15 minutes = 6 hours
fn default_projection_steps() -> i64 {
    24
}

fn default_step_minutes() -> i64 {
    15
}

fn default_entries_path() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("cobctl").join("entries.json")
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    ///
    /// The `[model]` section must pass validation.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.model.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("cobctl").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    ///
    /// Writes to a temp file in the same directory, syncs it, then renames
    /// it over the original so readers never see a half-written file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
