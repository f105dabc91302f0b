//! Pipeline configuration with reference-deployment defaults.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::degree_days::{DegreeDaySource, DEFAULT_BASE_TEMPERATURE};
use crate::gaps::DEFAULT_OUTLIER_THRESHOLD_CELSIUS;
use crate::grid::is_hour_aligned;
use crate::merge::MergeConfig;
use crate::population::{Scenario, DEFAULT_SHARE_TOLERANCE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub grid_start: NaiveDateTime,
    /// Inclusive.
    pub grid_end: NaiveDateTime,
    /// First output hour; `None` starts the output at `grid_start`.
    pub horizon_start: Option<NaiveDateTime>,
    /// Exclusive; rows at or after this instant are dropped.
    pub cutoff: NaiveDateTime,
    pub outlier_threshold_celsius: f64,
    pub base_temperature: f64,
    pub scenario: Scenario,
    pub degree_day_source: DegreeDaySource,
    pub share_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_start: ymd_h(2010, 1, 1, 7),
            grid_end: ymd_h(2021, 1, 5, 7),
            horizon_start: None,
            cutoff: ymd_h(2020, 12, 31, 0),
            outlier_threshold_celsius: DEFAULT_OUTLIER_THRESHOLD_CELSIUS,
            base_temperature: DEFAULT_BASE_TEMPERATURE,
            scenario: Scenario::Medium,
            degree_day_source: DegreeDaySource::SimpleAverage,
            share_tolerance: DEFAULT_SHARE_TOLERANCE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pipeline config: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    pub fn horizon_start(&self) -> NaiveDateTime {
        self.horizon_start.unwrap_or(self.grid_start)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&raw)?;
        info!(
            component = "config",
            event = "config.load.finish",
            path = %path.display(),
            scenario = config.scenario.as_str()
        );
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, ts) in [
            ("grid_start", self.grid_start),
            ("grid_end", self.grid_end),
            ("horizon_start", self.horizon_start()),
            ("cutoff", self.cutoff),
        ] {
            if !is_hour_aligned(ts) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be hour aligned, got {ts}"
                )));
            }
        }
        if self.grid_end < self.grid_start {
            return Err(ConfigError::Invalid(
                "grid_end must not be before grid_start".to_string(),
            ));
        }
        let horizon_start = self.horizon_start();
        if horizon_start < self.grid_start || horizon_start > self.grid_end {
            return Err(ConfigError::Invalid(
                "horizon_start must lie on the grid".to_string(),
            ));
        }
        if self.cutoff <= horizon_start {
            return Err(ConfigError::Invalid(
                "cutoff must be after horizon_start".to_string(),
            ));
        }
        if self.cutoff > self.grid_end + TimeDelta::hours(1) {
            return Err(ConfigError::Invalid(
                "cutoff must not extend past the grid".to_string(),
            ));
        }
        if !self.outlier_threshold_celsius.is_finite() || !self.base_temperature.is_finite() {
            return Err(ConfigError::Invalid(
                "outlier_threshold_celsius and base_temperature must be finite".to_string(),
            ));
        }
        if !self.share_tolerance.is_finite() || self.share_tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "share_tolerance must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            horizon_start: self.horizon_start(),
            cutoff: self.cutoff,
        }
    }
}

fn ymd_h(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"scenario":"high","base_temperature":15.5,"degree_day_source":"weighted_average"}"#,
        )
        .unwrap();
        assert_eq!(config.scenario, Scenario::High);
        assert_eq!(config.base_temperature, 15.5);
        assert_eq!(config.degree_day_source, DegreeDaySource::WeightedAverage);
        assert_eq!(config.grid_start, PipelineConfig::default().grid_start);
    }

    #[test]
    fn horizon_follows_configured_grid_start() {
        let config = PipelineConfig::from_json_str(
            r#"{"grid_start":"2015-01-01T00:00:00","grid_end":"2015-01-10T00:00:00","cutoff":"2015-01-09T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(config.horizon_start, None);
        assert_eq!(config.horizon_start(), config.grid_start);
        assert_eq!(config.merge_config().horizon_start, config.grid_start);
    }

    #[test]
    fn explicit_horizon_must_lie_on_grid() {
        let config = PipelineConfig::from_json_str(
            r#"{"grid_start":"2015-01-01T00:00:00","grid_end":"2015-01-10T00:00:00","horizon_start":"2015-01-02T00:00:00","cutoff":"2015-01-09T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(config.horizon_start(), config.grid_start + TimeDelta::days(1));

        let err = PipelineConfig::from_json_str(
            r#"{"grid_start":"2015-01-01T00:00:00","grid_end":"2015-01-10T00:00:00","horizon_start":"2014-12-31T00:00:00","cutoff":"2015-01-09T00:00:00"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn misaligned_cutoff_is_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"cutoff":"2020-12-30T12:30:00"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
