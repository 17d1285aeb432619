// Application settings
// Loaded from ~/.config/livecalc/settings.json

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use livecalc_engine::{BuiltinSet, EngineConfig, PlotDomain};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Engine
    #[serde(rename = "engine.quiescenceMs")]
    pub quiescence_ms: u64,

    #[serde(rename = "engine.extraBuiltins")]
    pub extra_builtins: Vec<String>,

    // Plotting
    #[serde(rename = "plot.domainStart")]
    pub plot_domain_start: f64,

    #[serde(rename = "plot.domainEnd")]
    pub plot_domain_end: f64,

    #[serde(rename = "plot.samples")]
    pub plot_samples: usize,

    // Formatting
    #[serde(rename = "format.significantDigits")]
    pub significant_digits: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quiescence_ms: 300,
            extra_builtins: Vec::new(),
            plot_domain_start: -100.0,
            plot_domain_end: 100.0,
            plot_samples: 10,
            significant_digits: 12,
        }
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Delay after the last keystroke before a cell is recomputed
    "engine.quiescenceMs": 300,

    // Extra names that are never treated as variables
    "engine.extraBuiltins": [],

    // Plot domain for cells without a "| start, end, samples" suffix
    "plot.domainStart": -100,
    "plot.domainEnd": 100,
    "plot.samples": 10,

    // Result formatting
    "format.significantDigits": 12
}
"#;

/// Drop lines starting with `//` so the file can carry comments.
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("livecalc");
        config_dir.join("settings.json")
    }

    /// Load settings from the user config dir, falling back to defaults.
    /// Creates a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = Self::create_default_file(&path) {
                log::warn!("{}", e);
            }
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load and validate settings from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&strip_comments(&contents)).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save current settings to the user config dir
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        fs::write(path, json).map_err(write_err)
    }

    fn create_default_file(path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, DEFAULT_CONFIG).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.plot_samples == 0 {
            return Err(SettingsError::Invalid("plot.samples must be at least 1".into()));
        }
        if !self.plot_domain_start.is_finite() || !self.plot_domain_end.is_finite() {
            return Err(SettingsError::Invalid("plot domain must be finite".into()));
        }
        if self.significant_digits == 0 || self.significant_digits > 17 {
            return Err(SettingsError::Invalid(
                "format.significantDigits must be between 1 and 17".into(),
            ));
        }
        Ok(())
    }

    pub fn plot_domain(&self) -> PlotDomain {
        PlotDomain::new(self.plot_domain_start, self.plot_domain_end, self.plot_samples)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            builtins: BuiltinSet::with_extra(self.extra_builtins.iter().map(String::as_str)),
            plot_domain: self.plot_domain(),
            significant_digits: self.significant_digits,
            quiescence: Duration::from_millis(self.quiescence_ms),
        }
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
