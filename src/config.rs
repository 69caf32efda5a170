//! Optional `.riskdash.toml` settings.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Metric;

pub const DEFAULT_CONFIG_FILE: &str = ".riskdash.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub insight: InsightConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Thresholds the insight classifiers use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Gap beyond which a store reads as above or below its group.
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: f64,

    /// Factor probability where the caution zone starts.
    #[serde(default = "default_caution_threshold")]
    pub caution_threshold: f64,

    /// Factor probability that calls for immediate action.
    #[serde(default = "default_urgent_threshold")]
    pub urgent_threshold: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            gap_threshold: default_gap_threshold(),
            caution_threshold: default_caution_threshold(),
            urgent_threshold: default_urgent_threshold(),
        }
    }
}

fn default_gap_threshold() -> f64 {
    0.1
}

fn default_caution_threshold() -> f64 {
    0.5
}

fn default_urgent_threshold() -> f64 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// File `report` writes to when `--out` is omitted.
    #[serde(default = "default_output")]
    pub output: String,

    /// Trend metric used when none is requested.
    #[serde(default = "default_metric")]
    pub default_metric: Metric,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            default_metric: default_metric(),
        }
    }
}

fn default_output() -> String {
    "store_risk_report.md".to_string()
}

fn default_metric() -> Metric {
    Metric::Composite
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, else `.riskdash.toml` when present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let insight = &self.insight;
        anyhow::ensure!(
            insight.gap_threshold >= 0.0,
            "insight.gap_threshold must not be negative"
        );
        anyhow::ensure!(
            insight.caution_threshold <= insight.urgent_threshold,
            "insight.caution_threshold must not exceed insight.urgent_threshold"
        );
        Ok(())
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to render default config")
    }
}
