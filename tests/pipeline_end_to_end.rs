use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use ail_canonical::{
    load_inputs_from_dir, load_population_counts, run_pipeline, station_regions,
    write_canonical_csv, CsvIoError, FixedHolidayCalendar, MergeError, PipelineConfig,
    PipelineError, RegionWeightTable, Station, LOAD_FILE, OIL_FUTURES_FILE, OIL_SPOT_FILE,
    POPULATION_FILE, TEMPERATURES_FILE,
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const GRID_HOURS: i64 = 72;

fn at(hour: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2015, 1, 1)
        .expect("valid date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        + TimeDelta::hours(hour)
}

fn temperature(station: Station, hour: i64) -> f64 {
    -10.0 + station.index() as f64 + (hour % 24) as f64 * 0.5
}

fn config() -> PipelineConfig {
    PipelineConfig {
        grid_start: at(0),
        grid_end: at(GRID_HOURS - 1),
        horizon_start: Some(at(24)),
        cutoff: at(60),
        ..PipelineConfig::default()
    }
}

/// Writes the five tidy input files; `skip` drops (station, hour) readings.
fn write_inputs(dir: &Path, skip: &[(Station, i64)]) {
    let mut temperatures = String::from("station,timestamp,temperature_celsius\n");
    for station in Station::ALL {
        for hour in 0..GRID_HOURS {
            if skip.contains(&(station, hour)) {
                continue;
            }
            let value = if station == Station::Edmonton && hour == 40 {
                "57.0".to_string()
            } else {
                temperature(station, hour).to_string()
            };
            let _ = writeln!(
                temperatures,
                "{},{},{}",
                station.code(),
                at(hour).format("%Y-%m-%d %H:%M:%S"),
                value
            );
        }
    }
    fs::write(dir.join(TEMPERATURES_FILE), temperatures).expect("write temperatures");

    let mut population = String::from("region,year,scenario,population\n");
    for (region, count) in [(6, "1,400"), (11, "1300"), (16, "70"), (2, "230"), (99, "5000")] {
        let _ = writeln!(population, "{region},2015,pop_medium,\"{count}\"");
    }
    fs::write(dir.join(POPULATION_FILE), population).expect("write population");

    let mut load = String::from("timestamp,ail_demand,pool_price\n");
    for hour in 0..GRID_HOURS {
        let price = if hour == 30 { "-".to_string() } else { format!("{}", 20 + hour) };
        let _ = writeln!(
            load,
            "{},\"9,{:03}\",{}",
            at(hour).format("%Y-%m-%dT%H:%M:%S"),
            hour,
            price
        );
    }
    fs::write(dir.join(LOAD_FILE), load).expect("write load");

    fs::write(
        dir.join(OIL_SPOT_FILE),
        "date,wti_spot\n2014-12-31,53.27\n2015-01-01,\n2015-01-02,52.69\n",
    )
    .expect("write spot");
    fs::write(
        dir.join(OIL_FUTURES_FILE),
        "date,future_1,future_2,future_3,future_4\n2015-01-02,52.7,53.1,53.6,54.0\n",
    )
    .expect("write futures");
}

fn shares(dir: &Path) -> RegionWeightTable {
    let counts = load_population_counts(&dir.join(POPULATION_FILE)).expect("population loads");
    RegionWeightTable::from_counts(&counts, &station_regions(), 2015).expect("shares")
}

#[test]
fn builds_and_writes_canonical_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let skip = [
        (Station::Calgary, 30),
        (Station::Calgary, 26),
        (Station::Calgary, 27),
        (Station::Calgary, 28),
        (Station::Lethbridge, 0),
    ];
    write_inputs(dir.path(), &skip);

    let inputs = load_inputs_from_dir(dir.path()).expect("inputs load");
    let output = run_pipeline(
        &inputs,
        &config(),
        &FixedHolidayCalendar::default(),
        &shares(dir.path()),
    )
    .expect("pipeline runs");

    assert_eq!(output.report.grid_points, GRID_HOURS as usize);
    assert_eq!(output.records.len(), 36);
    assert_eq!(output.report.output_rows, 36);
    assert_eq!(output.records[0].merged.timestamp, at(24));
    assert_eq!(output.records[35].merged.timestamp, at(59));

    let calgary = &output.report.stations[Station::Calgary.index()];
    assert_eq!(calgary.isolated_gaps, 1);
    assert_eq!(calgary.contiguous_gaps, 3);
    assert_eq!(calgary.backfill.unresolved_total, 0);
    let edmonton = &output.report.stations[Station::Edmonton.index()];
    assert_eq!(edmonton.outliers.screened, vec![at(40)]);
    let lethbridge = &output.report.stations[Station::Lethbridge.index()];
    assert_eq!(lethbridge.backfill.unresolved, vec![at(0)]);

    // Hour 30 is isolated, hours 26..=28 are one contiguous run.
    let row_30 = &output.records[6].merged;
    assert_eq!(row_30.timestamp, at(30));
    assert_eq!(
        row_30.station_temps[Station::Calgary.index()],
        Some(temperature(Station::Calgary, 29))
    );
    assert_eq!(row_30.pool_price, None);
    assert_eq!(row_30.ail_demand, 9_030.0);
    let row_27 = &output.records[3].merged;
    assert_eq!(
        row_27.station_temps[Station::Calgary.index()],
        Some(temperature(Station::Calgary, 3))
    );
    let row_40 = &output.records[16].merged;
    assert_eq!(
        row_40.station_temps[Station::Edmonton.index()],
        Some(temperature(Station::Edmonton, 39))
    );

    // The blank Jan 1 spot row is skipped; futures before Jan 2 back-fill.
    assert_eq!(output.records[0].merged.wti_spot, 52.69);
    assert_eq!(output.records[0].merged.futures, [52.7, 53.1, 53.6, 54.0]);

    let out_path = dir.path().join("out").join("canonical.csv");
    write_canonical_csv(&out_path, &output.schema, &output.records).expect("csv written");
    assert!(!dir.path().join("out").join("canonical.csv.tmp").exists());

    let mut reader = csv::Reader::from_path(&out_path).expect("csv readable");
    let header: Vec<String> = reader
        .headers()
        .expect("header")
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(header, output.schema.column_names());
    assert_eq!(header.last().map(String::as_str), Some("year_2015"));
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("rows parse");
    assert_eq!(rows.len(), 36);
    assert_eq!(&rows[0][0], "2015-01-02 00:00:00");
    assert!(rows.iter().all(|row| row.len() == header.len()));
}

#[test]
fn unresolved_gap_inside_horizon_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let skip: Vec<(Station, i64)> = (20..24)
        .chain(44..48)
        .map(|hour| (Station::FortMcMurray, hour))
        .collect();
    write_inputs(dir.path(), &skip);

    let inputs = load_inputs_from_dir(dir.path()).expect("inputs load");
    let err = run_pipeline(
        &inputs,
        &config(),
        &FixedHolidayCalendar::default(),
        &shares(dir.path()),
    )
    .expect_err("hour 44 cannot be resolved");

    assert!(matches!(
        err,
        PipelineError::Merge(MergeError::RequiredColumnGap {
            column: "avg_temp",
            timestamp
        }) if timestamp == at(44)
    ));
}

#[test]
fn station_without_readings_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let skip: Vec<(Station, i64)> = (0..GRID_HOURS)
        .map(|hour| (Station::Lethbridge, hour))
        .collect();
    write_inputs(dir.path(), &skip);

    let inputs = load_inputs_from_dir(dir.path()).expect("inputs load");
    let err = run_pipeline(
        &inputs,
        &config(),
        &FixedHolidayCalendar::default(),
        &shares(dir.path()),
    )
    .expect_err("missing station");
    assert!(matches!(err, PipelineError::Gap(_)));
}

#[test]
fn malformed_input_reports_line_and_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_inputs(dir.path(), &[]);
    fs::write(
        dir.path().join(LOAD_FILE),
        "timestamp,ail_demand,pool_price\n2015-01-01 00:00:00,9000,20\n2015-01-01 01:00:00,abc,21\n",
    )
    .expect("overwrite load");

    let err = load_inputs_from_dir(dir.path()).expect_err("bad demand value");
    match err {
        CsvIoError::ParseField {
            line, field, value, ..
        } => {
            assert_eq!(line, 3);
            assert_eq!(field, "ail_demand");
            assert_eq!(value, "abc");
        }
        other => panic!("unexpected error: {other}"),
    }
}
