//! End-to-end build of the canonical hourly dataset.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::backfill::{backfill_station, BackfillReport, BackfilledSeries};
use crate::calendar::{attach_calendar, CalendarEncoding, CalendarError, HolidayCalendar};
use crate::composite::{aggregate_composite, CompositeError};
use crate::config::{ConfigError, PipelineConfig};
use crate::degree_days::compute_degree_days;
use crate::gaps::{classify_station, GapError, OutlierReport, StationReading};
use crate::grid::{build_hourly_grid, GridError};
use crate::merge::{merge_canonical, MarketSources, MergeError};
use crate::population::PopulationShares;
use crate::schema::{build_canonical_schema, CanonicalRecord, CanonicalSchema};
use crate::station::Station;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineInputs {
    /// Readings for every station, in any order.
    pub temperatures: Vec<StationReading>,
    pub sources: MarketSources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReport {
    pub station: Station,
    pub isolated_gaps: usize,
    pub contiguous_gaps: usize,
    pub outliers: OutlierReport,
    pub backfill: BackfillReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub grid_points: usize,
    pub output_rows: usize,
    pub stations: Vec<StationReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub schema: CanonicalSchema,
    pub records: Vec<CanonicalRecord>,
    pub report: PipelineReport,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Gap(#[from] GapError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

pub fn run_pipeline(
    inputs: &PipelineInputs,
    config: &PipelineConfig,
    calendar: &dyn HolidayCalendar,
    shares: &dyn PopulationShares,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    info!(
        component = "pipeline",
        event = "pipeline.run.start",
        grid_start = %config.grid_start,
        grid_end = %config.grid_end,
        cutoff = %config.cutoff,
        scenario = config.scenario.as_str(),
        temperature_readings = inputs.temperatures.len()
    );

    let grid = build_hourly_grid(config.grid_start, config.grid_end)?;

    // Stations are independent until the composite step.
    let per_station: Vec<(BackfilledSeries, StationReport)> = Station::ALL
        .par_iter()
        .map(|&station| -> Result<(BackfilledSeries, StationReport), GapError> {
            let readings: Vec<StationReading> = inputs
                .temperatures
                .iter()
                .filter(|reading| reading.station == station)
                .cloned()
                .collect();
            let (classification, outliers) =
                classify_station(station, &readings, &grid, config.outlier_threshold_celsius)?;
            let (series, backfill) = backfill_station(&classification);
            let report = StationReport {
                station,
                isolated_gaps: classification.isolated_count(),
                contiguous_gaps: classification.contiguous_count(),
                outliers,
                backfill,
            };
            Ok((series, report))
        })
        .collect::<Result<_, _>>()?;

    let (series, stations): (Vec<BackfilledSeries>, Vec<StationReport>) =
        per_station.into_iter().unzip();

    let composite = aggregate_composite(
        &grid,
        &series,
        shares,
        config.scenario,
        config.share_tolerance,
    )?;
    let degree_days =
        compute_degree_days(&composite, config.base_temperature, config.degree_day_source);
    let merged = merge_canonical(
        &grid,
        &composite,
        &degree_days,
        &inputs.sources,
        &config.merge_config(),
    )?;

    let encoding = CalendarEncoding::for_horizon(config.horizon_start(), config.cutoff)?;
    let schema = build_canonical_schema(&encoding);
    let records = attach_calendar(merged, calendar, &encoding)?;

    let report = PipelineReport {
        grid_points: grid.len(),
        output_rows: records.len(),
        stations,
    };

    info!(
        component = "pipeline",
        event = "pipeline.run.finish",
        grid_points = report.grid_points,
        output_rows = report.output_rows,
        fingerprint = %schema.fingerprint
    );

    Ok(PipelineOutput {
        schema,
        records,
        report,
    })
}
