//! Aligns load, oil prices, and composite temperature onto the canonical grid.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::composite::CompositeTemperature;
use crate::degree_days::DegreeDayRecord;
use crate::grid::{is_hour_aligned, HourlyGrid};
use crate::station::STATION_COUNT;

pub const FUTURES_CONTRACTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadPoint {
    pub timestamp: NaiveDateTime,
    pub ail_demand: f64,
    pub pool_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSources {
    pub load: Vec<LoadPoint>,
    pub wti_spot: Vec<DailyPoint>,
    pub futures: [Vec<DailyPoint>; FUTURES_CONTRACTS],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    pub horizon_start: NaiveDateTime,
    /// Rows at or after this instant are dropped.
    pub cutoff: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub timestamp: NaiveDateTime,
    pub pool_price: Option<f64>,
    pub ail_demand: f64,
    pub avg_temp: f64,
    pub weighted_avg_temp: f64,
    pub station_temps: [Option<f64>; STATION_COUNT],
    pub degree_days: f64,
    pub futures: [f64; FUTURES_CONTRACTS],
    pub wti_spot: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("{source_name} has {actual} points but the grid has {expected}")]
    GridLengthMismatch {
        source_name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{source_name} point at {timestamp} is not hour aligned")]
    MisalignedTimestamp {
        source_name: &'static str,
        timestamp: NaiveDateTime,
    },
    #[error("{source_name} has a duplicate point at {timestamp}")]
    DuplicateTimestamp {
        source_name: &'static str,
        timestamp: NaiveDateTime,
    },
    #[error("{source_name} has a duplicate value for {date}")]
    DuplicateDate {
        source_name: &'static str,
        date: NaiveDate,
    },
    #[error("daily source {source_name} has no values")]
    EmptyDailySeries { source_name: &'static str },
    #[error("merge horizon [{horizon_start}, {cutoff}) is empty or outside the grid")]
    HorizonOutsideGrid {
        horizon_start: NaiveDateTime,
        cutoff: NaiveDateTime,
    },
    #[error("required column {column} has no value at {timestamp}")]
    RequiredColumnGap {
        column: &'static str,
        timestamp: NaiveDateTime,
    },
}

pub fn futures_source_name(contract: usize) -> &'static str {
    match contract {
        0 => "future_1",
        1 => "future_2",
        2 => "future_3",
        _ => "future_4",
    }
}

/// Carries daily values onto every grid hour.
///
/// Each daily value is anchored at midnight of its date. An hour takes the
/// latest anchor at or before it (including anchors before the grid) and
/// falls back to the earliest later anchor when none precedes it.
pub fn align_daily_to_grid(
    grid: &HourlyGrid,
    points: &[DailyPoint],
    source_name: &'static str,
) -> Result<Vec<f64>, MergeError> {
    let mut anchors: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
    for point in points {
        let anchor = point.date.and_time(chrono::NaiveTime::MIN);
        if anchors.insert(anchor, point.value).is_some() {
            return Err(MergeError::DuplicateDate {
                source_name,
                date: point.date,
            });
        }
    }
    let anchors: Vec<(NaiveDateTime, f64)> = anchors.into_iter().collect();
    let Some(&(_, first_value)) = anchors.first() else {
        return Err(MergeError::EmptyDailySeries { source_name });
    };

    let mut out = Vec::with_capacity(grid.len());
    let mut next = 0usize;
    let mut backward_filled = 0usize;
    for ts in grid.iter() {
        while next < anchors.len() && anchors[next].0 <= ts {
            next += 1;
        }
        let value = if next > 0 {
            anchors[next - 1].1
        } else {
            backward_filled += 1;
            first_value
        };
        out.push(value);
    }

    debug!(
        component = "merge",
        event = "merge.daily.aligned",
        source = source_name,
        anchors = anchors.len(),
        backward_filled = backward_filled
    );

    Ok(out)
}

fn align_load_to_grid(
    grid: &HourlyGrid,
    load: &[LoadPoint],
) -> Result<Vec<Option<LoadPoint>>, MergeError> {
    let mut aligned: Vec<Option<LoadPoint>> = vec![None; grid.len()];
    let mut seen = HashSet::with_capacity(load.len());
    for point in load {
        if !is_hour_aligned(point.timestamp) {
            return Err(MergeError::MisalignedTimestamp {
                source_name: "ail_demand",
                timestamp: point.timestamp,
            });
        }
        if !seen.insert(point.timestamp) {
            return Err(MergeError::DuplicateTimestamp {
                source_name: "ail_demand",
                timestamp: point.timestamp,
            });
        }
        if let Some(index) = grid.position(point.timestamp) {
            aligned[index] = Some(*point);
        }
    }
    Ok(aligned)
}

/// Joins every source onto the grid and keeps the hours in
/// `[horizon_start, cutoff)`.
///
/// Temperature, degree-day, and load columns must be fully populated in the
/// kept hours; the first gap aborts the merge.
pub fn merge_canonical(
    grid: &HourlyGrid,
    composite: &[CompositeTemperature],
    degree_days: &[DegreeDayRecord],
    sources: &MarketSources,
    cfg: &MergeConfig,
) -> Result<Vec<MergedRecord>, MergeError> {
    ensure_grid_length("composite_temperature", grid, composite.len())?;
    ensure_grid_length("degree_days", grid, degree_days.len())?;
    let (first, last_exclusive) = horizon_bounds(grid, cfg)?;

    let load = align_load_to_grid(grid, &sources.load)?;
    let wti_spot = align_daily_to_grid(grid, &sources.wti_spot, "wti_spot")?;
    let mut futures: Vec<Vec<f64>> = Vec::with_capacity(FUTURES_CONTRACTS);
    for (contract, points) in sources.futures.iter().enumerate() {
        futures.push(align_daily_to_grid(
            grid,
            points,
            futures_source_name(contract),
        )?);
    }

    let mut out = Vec::with_capacity(last_exclusive - first);
    for index in first..last_exclusive {
        let timestamp = grid.timestamps()[index];
        let temperature = &composite[index];
        let load_point = load[index];

        let avg_temp = require("avg_temp", timestamp, temperature.simple_average)?;
        let weighted_avg_temp =
            require("weighted_avg_temp", timestamp, temperature.weighted_average)?;
        let degree_value = require("degree_days", timestamp, degree_days[index].value)?;
        let ail_demand = require("ail_demand", timestamp, load_point.map(|p| p.ail_demand))?;

        let mut contracts = [0.0; FUTURES_CONTRACTS];
        for (slot, series) in contracts.iter_mut().zip(futures.iter()) {
            *slot = series[index];
        }

        out.push(MergedRecord {
            timestamp,
            pool_price: load_point.and_then(|p| p.pool_price),
            ail_demand,
            avg_temp,
            weighted_avg_temp,
            station_temps: temperature.stations,
            degree_days: degree_value,
            futures: contracts,
            wti_spot: wti_spot[index],
        });
    }

    info!(
        component = "merge",
        event = "merge.canonical.finish",
        horizon_start = %cfg.horizon_start,
        cutoff = %cfg.cutoff,
        grid_points = grid.len(),
        output_rows = out.len()
    );

    Ok(out)
}

fn ensure_grid_length(
    source_name: &'static str,
    grid: &HourlyGrid,
    actual: usize,
) -> Result<(), MergeError> {
    if actual != grid.len() {
        return Err(MergeError::GridLengthMismatch {
            source_name,
            expected: grid.len(),
            actual,
        });
    }
    Ok(())
}

fn horizon_bounds(grid: &HourlyGrid, cfg: &MergeConfig) -> Result<(usize, usize), MergeError> {
    let outside = MergeError::HorizonOutsideGrid {
        horizon_start: cfg.horizon_start,
        cutoff: cfg.cutoff,
    };
    if cfg.cutoff <= cfg.horizon_start || !is_hour_aligned(cfg.cutoff) {
        return Err(outside);
    }
    let first = grid.position(cfg.horizon_start).ok_or(outside.clone())?;
    let last_exclusive = grid
        .timestamps()
        .partition_point(|ts| *ts < cfg.cutoff);
    if cfg.cutoff > grid.end() + chrono::TimeDelta::hours(1) || last_exclusive <= first {
        return Err(outside);
    }
    Ok((first, last_exclusive))
}

fn require(
    column: &'static str,
    timestamp: NaiveDateTime,
    value: Option<f64>,
) -> Result<f64, MergeError> {
    value.ok_or_else(|| {
        error!(
            component = "merge",
            event = "merge.postcondition.violated",
            column = column,
            timestamp = %timestamp
        );
        MergeError::RequiredColumnGap { column, timestamp }
    })
}
