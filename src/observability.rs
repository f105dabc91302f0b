//! Logging setup for the canonical build and its lifecycle events.

use std::env;
use std::path::Path;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::pipeline::PipelineReport;

pub const LOG_LEVEL_VAR: &str = "AIL_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "AIL_LOG_FORMAT";
pub const LOG_TARGET_VAR: &str = "AIL_LOG_TARGET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    /// Single-line human output, handy for long batch runs.
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `ail_canonical::gaps=debug`.
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Reads `AIL_LOG_LEVEL`, `AIL_LOG_FORMAT` and `AIL_LOG_TARGET` from the
/// process environment.
pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from_lookup(|key| env::var(key).ok())
}

/// Builds a [`LoggingConfig`] from any key lookup. Blank or unrecognised
/// values keep the default for that field.
pub fn logging_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let defaults = LoggingConfig::default();
    let level = lookup(LOG_LEVEL_VAR)
        .map(|raw| raw.trim().to_string())
        .filter(|level| !level.is_empty())
        .unwrap_or(defaults.level);
    let format = lookup(LOG_FORMAT_VAR)
        .and_then(|raw| parse_log_format(&raw))
        .unwrap_or(defaults.format);
    let include_target = lookup(LOG_TARGET_VAR)
        .and_then(|raw| parse_switch(&raw))
        .unwrap_or(defaults.include_target);

    LoggingConfig {
        level,
        format,
        include_target,
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(!matches!(config.format, LogFormat::Json));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())?
        }
    }

    Ok(())
}

pub fn log_build_start(config: &LoggingConfig) {
    info!(
        component = "canonical_build",
        event = "build.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target
    );
}

/// Records where inputs come from and the grid the run will cover.
pub fn log_inputs_selected(input_dir: &Path, config_path: Option<&Path>, config: &PipelineConfig) {
    let config_source = config_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    info!(
        component = "canonical_build",
        event = "build.inputs.selected",
        input_dir = %input_dir.display(),
        config_source = %config_source,
        grid_start = %config.grid_start,
        grid_end = %config.grid_end,
        horizon_start = %config.horizon_start(),
        cutoff = %config.cutoff,
        scenario = config.scenario.as_str()
    );
}

/// One event per station with its gap and imputation counts.
pub fn log_station_summaries(report: &PipelineReport) {
    for station in &report.stations {
        info!(
            component = "canonical_build",
            event = "build.station.summary",
            station = station.station.code(),
            isolated_gaps = station.isolated_gaps,
            contiguous_gaps = station.contiguous_gaps,
            outliers = station.outliers.screened.len(),
            unresolved = station.backfill.unresolved_total
        );
    }
}

pub fn log_output_written(path: &Path, rows: usize, fingerprint: &str) {
    info!(
        component = "canonical_build",
        event = "build.output.written",
        path = %path.display(),
        rows,
        fingerprint
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        "compact" => Some(LogFormat::Compact),
        _ => None,
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> LoggingConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        logging_config_from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn nothing_set_gives_pretty_info_with_targets() {
        assert_eq!(config_from(&[]), LoggingConfig::default());
    }

    #[test]
    fn values_are_trimmed_and_case_folded() {
        let cfg = config_from(&[
            (LOG_LEVEL_VAR, "  ail_canonical::gaps=debug,info \n"),
            (LOG_FORMAT_VAR, " JSON "),
            (LOG_TARGET_VAR, "Off"),
        ]);

        assert_eq!(cfg.level, "ail_canonical::gaps=debug,info");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn compact_format_is_recognised() {
        let cfg = config_from(&[(LOG_FORMAT_VAR, "compact"), (LOG_TARGET_VAR, "1")]);
        assert_eq!(cfg.format, LogFormat::Compact);
        assert!(cfg.include_target);
    }

    #[test]
    fn blank_or_unknown_values_keep_defaults() {
        let cfg = config_from(&[
            (LOG_LEVEL_VAR, "   "),
            (LOG_FORMAT_VAR, "yaml"),
            (LOG_TARGET_VAR, "sometimes"),
        ]);
        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        let cfg = config_from(&[("RUST_LOG", "trace"), ("AIL_INPUT_DIR", "data/raw")]);
        assert_eq!(cfg, LoggingConfig::default());
    }
}
