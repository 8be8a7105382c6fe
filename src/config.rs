//! Run configuration, loaded from a TOML file.
//!
//! Every field has a default, so a missing file or a file with only a few
//! keys is valid. Command-line arguments override the directories.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::band::Bound;
use crate::error::{PanelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    pub panel: PanelConfig,
    pub reconcile: ReconcileConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("out"),
            output_format: OutputFormat::default(),
            panel: PanelConfig::default(),
            reconcile: ReconcileConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Years after the last surveyed year filled with a copy of it.
    pub trailing_years: u32,
    /// Statistic column of the raw extracts, per bound.
    pub median_column: String,
    pub upper_column: String,
    pub lower_column: String,
}

impl PanelConfig {
    pub fn statistic_column(&self, bound: Bound) -> &str {
        match bound {
            Bound::Median => &self.median_column,
            Bound::Upper => &self.upper_column,
            Bound::Lower => &self.lower_column,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            trailing_years: 2,
            median_column: "median".into(),
            upper_column: "upperci_95".into(),
            lower_column: "lowerci_95".into(),
        }
    }
}

/// Substitute a country's missing band values with another country's.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferenceSubstitution {
    pub country: String,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Final-use categories that are not food.
    pub excluded_final_uses: Vec<String>,
    /// GDD country codes dropped entirely (no survey coverage).
    pub excluded_countries: Vec<String>,
    /// GDD country codes without rural population.
    pub city_states: Vec<String>,
    /// Food groups split 1:1 where the survey has no coverage.
    pub equal_split_food_groups: Vec<String>,
    pub reference_substitutions: Vec<ReferenceSubstitution>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            excluded_final_uses: vec!["Unknown".into(), "Other uses".into()],
            excluded_countries: vec!["PRK".into()],
            city_states: vec!["SGP".into()],
            equal_split_food_groups: vec!["Sugars and stimulants".into()],
            reference_substitutions: vec![ReferenceSubstitution {
                country: "SOM".into(),
                reference: "ETH".into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PanelError::Config(e.to_string()))
    }

    /// Load `path` if given and present. A missing file logs a warning and
    /// falls back to defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
