//! Canonical hourly dataset for Alberta Internal Load modelling.
//!
//! Stages, in pipeline order:
//! - hourly UTC grid
//! - per-station outlier screening, gap classification, and backfill
//! - population-weighted composite temperature and degree days
//! - load and daily oil price alignment with a cutoff
//! - calendar fields and fixed one-hot encodings
//!
//! Every stage is callable on its own; `run_pipeline` chains them.

mod backfill;
mod calendar;
mod composite;
mod config;
mod csv_io;
mod degree_days;
mod gaps;
mod grid;
mod merge;
mod observability;
mod pipeline;
mod population;
mod schema;
mod station;

pub use backfill::{backfill_station, BackfillReport, BackfilledSeries};
pub use calendar::{
    attach_calendar, calendar_features, canadian_holidays, CalendarEncoding, CalendarError,
    CalendarFeatures, CanadianHolidays, FixedHolidayCalendar, HolidayCalendar, HOURS_PER_DAY,
    MONTH_NAMES, WEEKDAY_NAMES,
};
pub use composite::{aggregate_composite, CompositeError, CompositeTemperature};
pub use config::{ConfigError, PipelineConfig};
pub use csv_io::{
    load_daily_series, load_futures, load_inputs_from_dir, load_load_points,
    load_population_counts, load_station_readings, parse_timestamp, write_canonical_csv,
    CsvIoError, LOAD_FILE, OIL_FUTURES_FILE, OIL_SPOT_FILE, POPULATION_FILE, TEMPERATURES_FILE,
};
pub use degree_days::{
    compute_degree_days, degree_value, DegreeDayRecord, DegreeDaySource,
    DEFAULT_BASE_TEMPERATURE,
};
pub use gaps::{
    classify_gaps, classify_station, join_onto_grid, screen_outliers, GapClassification, GapError,
    GapKind, GapRun, GapTag, OutlierReport, StationReading, StationSeries,
    DEFAULT_OUTLIER_THRESHOLD_CELSIUS,
};
pub use grid::{build_hourly_grid, is_hour_aligned, GridError, HourlyGrid, HOUR_SECONDS};
pub use merge::{
    align_daily_to_grid, futures_source_name, merge_canonical, DailyPoint, LoadPoint,
    MarketSources, MergeConfig, MergeError, MergedRecord, FUTURES_CONTRACTS,
};
pub use observability::{
    init_logging, log_build_start, log_inputs_selected, log_output_written,
    log_station_summaries, logging_config_from_env, logging_config_from_lookup, LogFormat,
    LoggingConfig, LoggingInitError, LOG_FORMAT_VAR, LOG_LEVEL_VAR, LOG_TARGET_VAR,
};
pub use pipeline::{
    run_pipeline, PipelineError, PipelineInputs, PipelineOutput, PipelineReport, StationReport,
};
pub use population::{
    parse_scenario, PopulationCount, PopulationError, PopulationShares, RegionWeight,
    RegionWeightTable, Scenario, DEFAULT_SHARE_TOLERANCE,
};
pub use schema::{
    assert_schema_compatible, build_canonical_schema, CanonicalColumn, CanonicalRecord,
    CanonicalSchema, ColumnKind, SchemaError, CANONICAL_SCHEMA_VERSION, TIMESTAMP_FORMAT,
};
pub use station::{
    parse_station, station_regions, RegionId, Station, StationError, STATION_COUNT,
};
