//! Station series screening, grid join, and missing-sample classification.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::grid::{is_hour_aligned, HourlyGrid};
use crate::station::Station;

pub const DEFAULT_OUTLIER_THRESHOLD_CELSIUS: f64 = 40.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    pub station: Station,
    pub timestamp: NaiveDateTime,
    pub temperature_celsius: Option<f64>,
}

/// One station's values aligned index-for-index with the canonical grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSeries {
    pub station: Station,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapKind {
    Isolated,
    Contiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapTag {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub kind: GapKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRun {
    pub start: NaiveDateTime,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapClassification {
    pub series: StationSeries,
    pub tags: Vec<GapTag>,
}

impl GapClassification {
    pub fn isolated_count(&self) -> usize {
        self.tags
            .iter()
            .filter(|tag| tag.kind == GapKind::Isolated)
            .count()
    }

    pub fn contiguous_count(&self) -> usize {
        self.tags
            .iter()
            .filter(|tag| tag.kind == GapKind::Contiguous)
            .count()
    }

    /// Maximal runs of consecutive missing hours.
    pub fn runs(&self) -> Vec<GapRun> {
        let mut runs: Vec<GapRun> = Vec::new();
        let mut last_index: Option<usize> = None;
        for tag in &self.tags {
            let extends = last_index.is_some_and(|prev| tag.index == prev + 1);
            match runs.last_mut() {
                Some(run) if extends => run.len += 1,
                _ => runs.push(GapRun {
                    start: tag.timestamp,
                    len: 1,
                }),
            }
            last_index = Some(tag.index);
        }
        runs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub station: Station,
    pub threshold_celsius: f64,
    pub screened: Vec<NaiveDateTime>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GapError {
    #[error("station {station:?} has no readings on the canonical grid")]
    EmptyStationSeries { station: Station },
    #[error("reading for {found:?} passed to the {expected:?} series at {timestamp}")]
    StationMismatch {
        expected: Station,
        found: Station,
        timestamp: NaiveDateTime,
    },
    #[error("reading for {station:?} at {timestamp} is not hour aligned")]
    MisalignedTimestamp {
        station: Station,
        timestamp: NaiveDateTime,
    },
    #[error("duplicate reading for {station:?} at {timestamp}")]
    DuplicateTimestamp {
        station: Station,
        timestamp: NaiveDateTime,
    },
}

/// Converts implausible or non-finite temperatures into absence markers.
///
/// Values strictly above `threshold_celsius` are screened; the readings are
/// otherwise returned unchanged.
pub fn screen_outliers(
    station: Station,
    readings: &[StationReading],
    threshold_celsius: f64,
) -> (Vec<StationReading>, OutlierReport) {
    let mut screened = Vec::new();
    let cleaned = readings
        .iter()
        .map(|reading| match reading.temperature_celsius {
            Some(value) if !value.is_finite() || value > threshold_celsius => {
                screened.push(reading.timestamp);
                StationReading {
                    temperature_celsius: None,
                    ..reading.clone()
                }
            }
            _ => reading.clone(),
        })
        .collect();

    if !screened.is_empty() {
        info!(
            component = "gaps",
            event = "gaps.outliers.screened",
            station = station.code(),
            threshold_celsius = threshold_celsius,
            screened = screened.len()
        );
    }

    (
        cleaned,
        OutlierReport {
            station,
            threshold_celsius,
            screened,
        },
    )
}

/// Left join of the grid against one station stream.
///
/// Every grid instant appears exactly once; instants without a reading become
/// absence markers and readings outside the grid are dropped. A station with
/// no present value on the grid is rejected as empty.
pub fn join_onto_grid(
    station: Station,
    readings: &[StationReading],
    grid: &HourlyGrid,
) -> Result<StationSeries, GapError> {
    let mut values: Vec<Option<f64>> = vec![None; grid.len()];
    let mut seen = vec![false; grid.len()];
    let mut on_grid = 0usize;
    let mut off_grid = 0usize;

    for reading in readings {
        if reading.station != station {
            return Err(GapError::StationMismatch {
                expected: station,
                found: reading.station,
                timestamp: reading.timestamp,
            });
        }
        if !is_hour_aligned(reading.timestamp) {
            return Err(GapError::MisalignedTimestamp {
                station,
                timestamp: reading.timestamp,
            });
        }
        let Some(index) = grid.position(reading.timestamp) else {
            off_grid += 1;
            continue;
        };
        if seen[index] {
            return Err(GapError::DuplicateTimestamp {
                station,
                timestamp: reading.timestamp,
            });
        }
        seen[index] = true;
        values[index] = reading.temperature_celsius;
        if reading.temperature_celsius.is_some() {
            on_grid += 1;
        }
    }

    if on_grid == 0 {
        return Err(GapError::EmptyStationSeries { station });
    }

    if off_grid > 0 {
        debug!(
            component = "gaps",
            event = "gaps.join.off_grid_dropped",
            station = station.code(),
            dropped = off_grid
        );
    }

    Ok(StationSeries {
        station,
        timestamps: grid.timestamps().to_vec(),
        values,
    })
}

/// Tags each missing sample as isolated or part of a contiguous run.
///
/// A sample is contiguous when the hour before or the hour after is also
/// missing; the grid edges count as present neighbours.
pub fn classify_gaps(series: StationSeries) -> GapClassification {
    let values = &series.values;
    let mut tags = Vec::new();

    for (index, value) in values.iter().enumerate() {
        if value.is_some() {
            continue;
        }
        let prev_missing = index > 0 && values[index - 1].is_none();
        let next_missing = index + 1 < values.len() && values[index + 1].is_none();
        let kind = if prev_missing || next_missing {
            GapKind::Contiguous
        } else {
            GapKind::Isolated
        };
        tags.push(GapTag {
            index,
            timestamp: series.timestamps[index],
            kind,
        });
    }

    let classification = GapClassification { series, tags };
    let runs = classification.runs();
    let longest_run = runs.iter().map(|run| run.len).max().unwrap_or(0);

    info!(
        component = "gaps",
        event = "gaps.classify.finish",
        station = classification.series.station.code(),
        missing = classification.tags.len(),
        isolated = classification.isolated_count(),
        contiguous = classification.contiguous_count(),
        runs = runs.len(),
        longest_run = longest_run
    );
    if longest_run >= 24 {
        warn!(
            component = "gaps",
            event = "gaps.classify.long_run",
            station = classification.series.station.code(),
            longest_run = longest_run
        );
    }

    classification
}

/// Outlier screening, grid join, and classification for one station.
pub fn classify_station(
    station: Station,
    readings: &[StationReading],
    grid: &HourlyGrid,
    threshold_celsius: f64,
) -> Result<(GapClassification, OutlierReport), GapError> {
    let (screened, outliers) = screen_outliers(station, readings, threshold_celsius);
    let series = join_onto_grid(station, &screened, grid)?;
    Ok((classify_gaps(series), outliers))
}
