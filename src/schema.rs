//! Canonical output contract: column order, version, and fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::calendar::{CalendarEncoding, CalendarFeatures};
use crate::merge::{futures_source_name, MergedRecord, FUTURES_CONTRACTS};
use crate::station::{Station, STATION_COUNT};

pub const CANONICAL_SCHEMA_VERSION: u32 = 1;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Timestamp,
    F64,
    OptionalF64,
    Int,
    Flag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalColumn {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<CanonicalColumn>,
}

impl CanonicalSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub merged: MergedRecord,
    pub calendar: CalendarFeatures,
    /// One flag per indicator column, in `CalendarEncoding::column_names` order.
    pub indicators: Vec<bool>,
}

impl CanonicalRecord {
    /// Text fields in schema column order; absent values are empty strings.
    pub fn to_fields(&self) -> Vec<String> {
        let m = &self.merged;
        let mut fields = Vec::with_capacity(BASE_COLUMN_COUNT + self.indicators.len());
        fields.push(m.timestamp.format(TIMESTAMP_FORMAT).to_string());
        fields.push(self.calendar.hour.to_string());
        fields.push(optional(m.pool_price));
        fields.push(m.ail_demand.to_string());
        fields.push(m.avg_temp.to_string());
        fields.push(m.weighted_avg_temp.to_string());
        fields.extend(m.station_temps.iter().map(|value| optional(*value)));
        fields.push(m.degree_days.to_string());
        fields.extend(m.futures.iter().map(|value| value.to_string()));
        fields.push(m.wti_spot.to_string());
        fields.push(self.calendar.weekday.to_string());
        fields.push(self.calendar.month.to_string());
        fields.push(self.calendar.year.to_string());
        fields.push(flag(self.calendar.holiday));
        fields.push(flag(self.calendar.working_day));
        fields.extend(self.indicators.iter().map(|value| flag(*value)));
        fields
    }
}

// timestamp, hour, price, load, 2 averages, stations, degree days, futures,
// spot, weekday, month, year, holiday, working day
const BASE_COLUMN_COUNT: usize = 6 + STATION_COUNT + 1 + FUTURES_CONTRACTS + 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },
}

pub fn build_canonical_schema(encoding: &CalendarEncoding) -> CanonicalSchema {
    let mut columns = Vec::with_capacity(BASE_COLUMN_COUNT + encoding.width());
    let mut push = |name: String, kind: ColumnKind| columns.push(CanonicalColumn { name, kind });

    push("begin_date_gmt".to_string(), ColumnKind::Timestamp);
    push("hour".to_string(), ColumnKind::Int);
    push("pool_price".to_string(), ColumnKind::OptionalF64);
    push("ail_demand".to_string(), ColumnKind::F64);
    push("avg_temp".to_string(), ColumnKind::F64);
    push("weighted_avg_temp".to_string(), ColumnKind::F64);
    for station in Station::ALL {
        push(format!("{}_temp", station.code()), ColumnKind::OptionalF64);
    }
    push("degree_days".to_string(), ColumnKind::F64);
    for contract in 0..FUTURES_CONTRACTS {
        push(futures_source_name(contract).to_string(), ColumnKind::F64);
    }
    push("wti_spot".to_string(), ColumnKind::F64);
    push("dayofweek".to_string(), ColumnKind::Int);
    push("month".to_string(), ColumnKind::Int);
    push("year".to_string(), ColumnKind::Int);
    push("holiday".to_string(), ColumnKind::Flag);
    push("workingday".to_string(), ColumnKind::Flag);
    for name in encoding.column_names() {
        push(name, ColumnKind::Flag);
    }

    let fingerprint = schema_fingerprint(encoding, &columns);

    info!(
        component = "schema",
        event = "schema.canonical.built",
        version = CANONICAL_SCHEMA_VERSION,
        first_year = encoding.first_year(),
        last_year = encoding.last_year(),
        column_count = columns.len(),
        fingerprint = fingerprint
    );

    CanonicalSchema {
        version: CANONICAL_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &CanonicalSchema,
) -> Result<(), SchemaError> {
    if expected_version != actual.version {
        return Err(SchemaError::VersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(SchemaError::FingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

fn schema_fingerprint(encoding: &CalendarEncoding, columns: &[CanonicalColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{CANONICAL_SCHEMA_VERSION};"));
    hasher.update(format!(
        "years:{}..={};",
        encoding.first_year(),
        encoding.last_year()
    ));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(format!(":{:?};", column.kind));
    }
    hex::encode(hasher.finalize())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flag(value: bool) -> String {
    let text = if value { "1" } else { "0" };
    text.to_string()
}
