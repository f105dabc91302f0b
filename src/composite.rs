//! Simple and population-weighted composite temperature across stations.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::backfill::BackfilledSeries;
use crate::grid::HourlyGrid;
use crate::population::{PopulationError, PopulationShares, Scenario};
use crate::station::{Station, STATION_COUNT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeTemperature {
    pub timestamp: NaiveDateTime,
    pub simple_average: Option<f64>,
    pub weighted_average: Option<f64>,
    /// Backfilled per-station values in `Station::ALL` order.
    pub stations: [Option<f64>; STATION_COUNT],
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompositeError {
    #[error("station {station:?} has no series value at {timestamp}")]
    MissingStation {
        station: Station,
        timestamp: NaiveDateTime,
    },
    #[error("station {station:?} was supplied more than once")]
    DuplicateStation { station: Station },
    #[error("station {station:?} series is not aligned with the grid at {timestamp}")]
    MisalignedSeries {
        station: Station,
        timestamp: NaiveDateTime,
    },
    #[error(transparent)]
    Population(#[from] PopulationError),
}

/// Combines backfilled station series into one composite record per grid hour.
///
/// An unresolved station value makes both averages unresolved for that hour;
/// the merge stage decides whether that is fatal. The station shares of every
/// year touched by the grid must sum to one within `share_tolerance`.
pub fn aggregate_composite(
    grid: &HourlyGrid,
    series: &[BackfilledSeries],
    shares: &dyn PopulationShares,
    scenario: Scenario,
    share_tolerance: f64,
) -> Result<Vec<CompositeTemperature>, CompositeError> {
    let mut by_station: [Option<&BackfilledSeries>; STATION_COUNT] = [None; STATION_COUNT];
    for station_series in series {
        let slot = &mut by_station[station_series.station.index()];
        if slot.is_some() {
            return Err(CompositeError::DuplicateStation {
                station: station_series.station,
            });
        }
        *slot = Some(station_series);
    }

    let mut out = Vec::with_capacity(grid.len());
    let mut unresolved_hours = 0u64;
    let mut cached_year: Option<(i32, [f64; STATION_COUNT])> = None;

    for (index, timestamp) in grid.iter().enumerate() {
        let mut stations = [None; STATION_COUNT];
        for station in Station::ALL {
            let station_series = by_station[station.index()]
                .ok_or(CompositeError::MissingStation { station, timestamp })?;
            let series_ts = station_series
                .timestamps
                .get(index)
                .copied()
                .ok_or(CompositeError::MissingStation { station, timestamp })?;
            if series_ts != timestamp {
                return Err(CompositeError::MisalignedSeries { station, timestamp });
            }
            stations[station.index()] = station_series.values.get(index).copied().flatten();
        }

        let year = timestamp.year();
        let weights = match cached_year {
            Some((cached, weights)) if cached == year => weights,
            _ => {
                let weights = year_weights(shares, year, scenario, share_tolerance)?;
                cached_year = Some((year, weights));
                weights
            }
        };

        let (simple_average, weighted_average) = match resolved_values(&stations) {
            Some(values) => {
                let simple = values.iter().sum::<f64>() / STATION_COUNT as f64;
                let weighted = values
                    .iter()
                    .zip(weights.iter())
                    .map(|(value, share)| value * share)
                    .sum::<f64>();
                (Some(simple), Some(weighted))
            }
            None => {
                unresolved_hours += 1;
                (None, None)
            }
        };

        out.push(CompositeTemperature {
            timestamp,
            simple_average,
            weighted_average,
            stations,
        });
    }

    info!(
        component = "composite",
        event = "composite.aggregate.finish",
        scenario = scenario.as_str(),
        points = out.len(),
        unresolved_hours = unresolved_hours
    );

    Ok(out)
}

fn year_weights(
    shares: &dyn PopulationShares,
    year: i32,
    scenario: Scenario,
    tolerance: f64,
) -> Result<[f64; STATION_COUNT], PopulationError> {
    let mut weights = [0.0; STATION_COUNT];
    for station in Station::ALL {
        let region = station.region();
        weights[station.index()] =
            shares
                .share(region, year, scenario)
                .ok_or(PopulationError::MissingWeight {
                    region,
                    year,
                    scenario,
                })?;
    }
    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() || (sum - 1.0).abs() > tolerance {
        return Err(PopulationError::SharesDoNotSumToOne {
            year,
            scenario,
            sum,
            tolerance,
        });
    }
    Ok(weights)
}

fn resolved_values(stations: &[Option<f64>; STATION_COUNT]) -> Option<[f64; STATION_COUNT]> {
    let mut values = [0.0; STATION_COUNT];
    for (slot, value) in values.iter_mut().zip(stations.iter()) {
        *slot = (*value)?;
    }
    Some(values)
}
