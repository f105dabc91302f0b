//! Tidy CSV inputs and the atomic canonical CSV writer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use thiserror::Error;
use tracing::info;

use crate::gaps::StationReading;
use crate::merge::{DailyPoint, LoadPoint, MarketSources, FUTURES_CONTRACTS};
use crate::pipeline::PipelineInputs;
use crate::population::{parse_scenario, PopulationCount};
use crate::schema::{CanonicalRecord, CanonicalSchema};
use crate::station::{parse_station, RegionId};

pub const TEMPERATURES_FILE: &str = "temperatures.csv";
pub const POPULATION_FILE: &str = "population.csv";
pub const LOAD_FILE: &str = "load.csv";
pub const OIL_SPOT_FILE: &str = "oil_spot.csv";
pub const OIL_FUTURES_FILE: &str = "oil_futures.csv";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const FUTURES_COLUMNS: [&str; FUTURES_CONTRACTS] =
    ["future_1", "future_2", "future_3", "future_4"];

#[derive(Debug, Error)]
pub enum CsvIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{path} line {line}: failed to parse field {field} value '{value}'")]
    ParseField {
        path: PathBuf,
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("row has {found} fields but the schema has {expected} columns")]
    RowWidthMismatch { found: usize, expected: usize },
    #[error("invalid output path: {0}")]
    InvalidOutputPath(PathBuf),
}

struct TidyReader {
    path: PathBuf,
    reader: csv::Reader<fs::File>,
    columns: HashMap<String, usize>,
}

impl TidyReader {
    fn open(path: &Path) -> Result<Self, CsvIoError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let columns = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.to_ascii_lowercase(), idx))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
        })
    }

    fn column(&self, name: &'static str) -> Result<usize, CsvIoError> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| CsvIoError::MissingColumn {
                path: self.path.clone(),
                column: name,
            })
    }

    fn records(&mut self) -> Result<Vec<StringRecord>, CsvIoError> {
        let mut out = Vec::new();
        for record in self.reader.records() {
            out.push(record?);
        }
        Ok(out)
    }

    fn parse_err(&self, record: &StringRecord, field: &'static str, idx: usize) -> CsvIoError {
        CsvIoError::ParseField {
            path: self.path.clone(),
            line: record.position().map(|pos| pos.line()).unwrap_or(0),
            field,
            value: record.get(idx).unwrap_or_default().to_string(),
        }
    }

    fn raw<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
        record.get(idx).unwrap_or_default()
    }

    fn timestamp(
        &self,
        record: &StringRecord,
        idx: usize,
        field: &'static str,
    ) -> Result<NaiveDateTime, CsvIoError> {
        parse_timestamp(Self::raw(record, idx)).ok_or_else(|| self.parse_err(record, field, idx))
    }

    fn date(
        &self,
        record: &StringRecord,
        idx: usize,
        field: &'static str,
    ) -> Result<NaiveDate, CsvIoError> {
        NaiveDate::parse_from_str(Self::raw(record, idx), DATE_FORMAT)
            .map_err(|_| self.parse_err(record, field, idx))
    }

    fn f64(&self, record: &StringRecord, idx: usize, field: &'static str) -> Result<f64, CsvIoError> {
        parse_number(Self::raw(record, idx)).ok_or_else(|| self.parse_err(record, field, idx))
    }

    fn optional_f64(
        &self,
        record: &StringRecord,
        idx: usize,
        field: &'static str,
    ) -> Result<Option<f64>, CsvIoError> {
        let raw = Self::raw(record, idx);
        if is_blank(raw) {
            return Ok(None);
        }
        parse_number(raw)
            .map(Some)
            .ok_or_else(|| self.parse_err(record, field, idx))
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
}

// Source exports carry thousands separators and "$"; a lone "-" means no value.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok()
}

fn is_blank(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("nan")
}

pub fn load_station_readings(path: &Path) -> Result<Vec<StationReading>, CsvIoError> {
    let mut tidy = TidyReader::open(path)?;
    let station_idx = tidy.column("station")?;
    let ts_idx = tidy.column("timestamp")?;
    let temp_idx = tidy.column("temperature_celsius")?;

    let mut readings = Vec::new();
    for record in tidy.records()? {
        let station = parse_station(TidyReader::raw(&record, station_idx))
            .map_err(|_| tidy.parse_err(&record, "station", station_idx))?;
        readings.push(StationReading {
            station,
            timestamp: tidy.timestamp(&record, ts_idx, "timestamp")?,
            temperature_celsius: tidy.optional_f64(&record, temp_idx, "temperature_celsius")?,
        });
    }
    Ok(readings)
}

pub fn load_population_counts(path: &Path) -> Result<Vec<PopulationCount>, CsvIoError> {
    let mut tidy = TidyReader::open(path)?;
    let region_idx = tidy.column("region")?;
    let year_idx = tidy.column("year")?;
    let scenario_idx = tidy.column("scenario")?;
    let population_idx = tidy.column("population")?;

    let mut counts = Vec::new();
    for record in tidy.records()? {
        let region = TidyReader::raw(&record, region_idx)
            .parse::<u16>()
            .map_err(|_| tidy.parse_err(&record, "region", region_idx))?;
        let year = TidyReader::raw(&record, year_idx)
            .parse::<i32>()
            .map_err(|_| tidy.parse_err(&record, "year", year_idx))?;
        let scenario = parse_scenario(TidyReader::raw(&record, scenario_idx))
            .map_err(|_| tidy.parse_err(&record, "scenario", scenario_idx))?;
        let population = TidyReader::raw(&record, population_idx)
            .replace(',', "")
            .parse::<u64>()
            .map_err(|_| tidy.parse_err(&record, "population", population_idx))?;
        counts.push(PopulationCount {
            region: RegionId(region),
            year,
            scenario,
            population,
        });
    }
    Ok(counts)
}

pub fn load_load_points(path: &Path) -> Result<Vec<LoadPoint>, CsvIoError> {
    let mut tidy = TidyReader::open(path)?;
    let ts_idx = tidy.column("timestamp")?;
    let demand_idx = tidy.column("ail_demand")?;
    let price_idx = tidy.column("pool_price")?;

    let mut points = Vec::new();
    for record in tidy.records()? {
        points.push(LoadPoint {
            timestamp: tidy.timestamp(&record, ts_idx, "timestamp")?,
            ail_demand: tidy.f64(&record, demand_idx, "ail_demand")?,
            pool_price: tidy.optional_f64(&record, price_idx, "pool_price")?,
        });
    }
    Ok(points)
}

/// Rows with a blank value are skipped; the merge fills those days.
pub fn load_daily_series(path: &Path, column: &'static str) -> Result<Vec<DailyPoint>, CsvIoError> {
    let mut tidy = TidyReader::open(path)?;
    let date_idx = tidy.column("date")?;
    let value_idx = tidy.column(column)?;

    let mut points = Vec::new();
    for record in tidy.records()? {
        if let Some(value) = tidy.optional_f64(&record, value_idx, column)? {
            points.push(DailyPoint {
                date: tidy.date(&record, date_idx, "date")?,
                value,
            });
        }
    }
    Ok(points)
}

pub fn load_futures(path: &Path) -> Result<[Vec<DailyPoint>; FUTURES_CONTRACTS], CsvIoError> {
    let mut out: [Vec<DailyPoint>; FUTURES_CONTRACTS] = Default::default();
    for (slot, column) in out.iter_mut().zip(FUTURES_COLUMNS) {
        *slot = load_daily_series(path, column)?;
    }
    Ok(out)
}

/// Loads every pipeline input except population from the standard file names.
pub fn load_inputs_from_dir(dir: &Path) -> Result<PipelineInputs, CsvIoError> {
    let temperatures = load_station_readings(&dir.join(TEMPERATURES_FILE))?;
    let sources = MarketSources {
        load: load_load_points(&dir.join(LOAD_FILE))?,
        wti_spot: load_daily_series(&dir.join(OIL_SPOT_FILE), "wti_spot")?,
        futures: load_futures(&dir.join(OIL_FUTURES_FILE))?,
    };

    info!(
        component = "csv_io",
        event = "csv_io.inputs.loaded",
        dir = %dir.display(),
        temperature_readings = temperatures.len(),
        load_points = sources.load.len(),
        wti_spot_points = sources.wti_spot.len()
    );

    Ok(PipelineInputs {
        temperatures,
        sources,
    })
}

/// Writes header and rows to `<path>.tmp`, then renames over `path`.
///
/// A failure part-way leaves any previous file at `path` untouched.
pub fn write_canonical_csv(
    path: &Path,
    schema: &CanonicalSchema,
    records: &[CanonicalRecord],
) -> Result<(), CsvIoError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| CsvIoError::InvalidOutputPath(path.to_path_buf()))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    let result = write_rows(&tmp_path, schema, records);
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    fs::rename(&tmp_path, path)?;

    info!(
        component = "csv_io",
        event = "csv_io.canonical.written",
        path = %path.display(),
        rows = records.len(),
        columns = schema.columns.len(),
        fingerprint = %schema.fingerprint
    );
    Ok(())
}

fn write_rows(
    tmp_path: &Path,
    schema: &CanonicalSchema,
    records: &[CanonicalRecord],
) -> Result<(), CsvIoError> {
    let file = fs::File::create(tmp_path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(schema.column_names())?;
    for record in records {
        let fields = record.to_fields();
        if fields.len() != schema.columns.len() {
            return Err(CsvIoError::RowWidthMismatch {
                found: fields.len(),
                expected: schema.columns.len(),
            });
        }
        writer.write_record(&fields)?;
    }
    let file = writer
        .into_inner()
        .map_err(|err| CsvIoError::Io(err.into_error()))?;
    file.sync_all()?;
    Ok(())
}
