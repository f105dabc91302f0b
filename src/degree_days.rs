//! Hourly degree contribution relative to a base temperature.
//!
//! The value is signed: positive when colder than the base, negative when
//! warmer, and exactly zero at the base. Consumers that need separate heating
//! and cooling buckets split on the sign.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::composite::CompositeTemperature;

pub const DEFAULT_BASE_TEMPERATURE: f64 = 18.0;
const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeDaySource {
    #[default]
    SimpleAverage,
    WeightedAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegreeDayRecord {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

pub fn degree_value(temperature: f64, base_temperature: f64) -> f64 {
    if temperature < base_temperature || temperature > base_temperature {
        (base_temperature - temperature) / HOURS_PER_DAY
    } else {
        0.0
    }
}

pub fn compute_degree_days(
    composite: &[CompositeTemperature],
    base_temperature: f64,
    source: DegreeDaySource,
) -> Vec<DegreeDayRecord> {
    let records: Vec<DegreeDayRecord> = composite
        .iter()
        .map(|point| {
            let temperature = match source {
                DegreeDaySource::SimpleAverage => point.simple_average,
                DegreeDaySource::WeightedAverage => point.weighted_average,
            };
            DegreeDayRecord {
                timestamp: point.timestamp,
                value: temperature.map(|t| degree_value(t, base_temperature)),
            }
        })
        .collect();

    info!(
        component = "degree_days",
        event = "degree_days.compute.finish",
        base_temperature = base_temperature,
        source = ?source,
        points = records.len()
    );

    records
}
