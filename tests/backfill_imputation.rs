use ail_canonical::{
    backfill_station, build_hourly_grid, classify_gaps, classify_station, join_onto_grid,
    GapError, GapKind, HourlyGrid, Station, StationReading, StationSeries,
    DEFAULT_OUTLIER_THRESHOLD_CELSIUS,
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

fn at(hour: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2010, 1, 1)
        .expect("valid date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        + TimeDelta::hours(hour)
}

fn grid(hours: i64) -> HourlyGrid {
    build_hourly_grid(at(0), at(hours - 1)).expect("grid should build")
}

fn series(values: &[Option<f64>]) -> StationSeries {
    StationSeries {
        station: Station::Calgary,
        timestamps: (0..values.len() as i64).map(at).collect(),
        values: values.to_vec(),
    }
}

fn readings(station: Station, values: &[Option<f64>]) -> Vec<StationReading> {
    values
        .iter()
        .enumerate()
        .map(|(hour, value)| StationReading {
            station,
            timestamp: at(hour as i64),
            temperature_celsius: *value,
        })
        .collect()
}

#[test]
fn isolated_gap_takes_previous_hour() {
    let classified = classify_gaps(series(&[
        Some(1.0),
        Some(2.0),
        Some(3.0),
        Some(4.0),
        None,
        Some(6.0),
    ]));
    assert_eq!(classified.tags.len(), 1);
    assert_eq!(classified.tags[0].kind, GapKind::Isolated);

    let (filled, report) = backfill_station(&classified);
    assert_eq!(filled.values[4], Some(4.0));
    assert_eq!(report.isolated_filled, 1);
    assert_eq!(report.unresolved_total, 0);
}

#[test]
fn short_contiguous_run_without_prior_day_stays_unresolved() {
    let classified = classify_gaps(series(&[
        Some(1.0),
        Some(2.0),
        None,
        None,
        Some(5.0),
        Some(6.0),
    ]));
    assert_eq!(classified.contiguous_count(), 2);
    assert_eq!(classified.isolated_count(), 0);

    let (filled, report) = backfill_station(&classified);
    assert_eq!(filled.values[2], None);
    assert_eq!(filled.values[3], None);
    assert_eq!(report.unresolved_total, 2);
    assert_eq!(report.unresolved, vec![at(2), at(3)]);
}

#[test]
fn contiguous_run_takes_same_hour_of_previous_day() {
    let mut values: Vec<Option<f64>> = (0..48).map(|h| Some(h as f64)).collect();
    for hour in 30..33 {
        values[hour] = None;
    }
    let (filled, report) = backfill_station(&classify_gaps(series(&values)));

    assert_eq!(filled.values[30], Some(6.0));
    assert_eq!(filled.values[31], Some(7.0));
    assert_eq!(filled.values[32], Some(8.0));
    assert_eq!(report.contiguous_filled, 3);
}

#[test]
fn multi_day_outage_chains_through_filled_values() {
    let mut values: Vec<Option<f64>> = (0..96).map(|h| Some((h % 24) as f64 + 100.0)).collect();
    values[5] = Some(-7.5);
    for hour in 24..72 {
        values[hour] = None;
    }
    let (filled, report) = backfill_station(&classify_gaps(series(&values)));

    assert_eq!(filled.values[29], Some(-7.5));
    assert_eq!(filled.values[53], Some(-7.5));
    assert!(filled.values.iter().all(Option::is_some));
    assert_eq!(report.contiguous_filled, 48);
}

#[test]
fn backfill_is_idempotent() {
    let mut values: Vec<Option<f64>> = (0..72).map(|h| Some(h as f64 * 0.5)).collect();
    values[10] = None;
    values[40] = None;
    values[41] = None;
    let (once, _) = backfill_station(&classify_gaps(series(&values)));

    let again_input = StationSeries {
        station: once.station,
        timestamps: once.timestamps.clone(),
        values: once.values.clone(),
    };
    let (twice, report) = backfill_station(&classify_gaps(again_input));

    assert_eq!(once, twice);
    assert_eq!(report.isolated_filled + report.contiguous_filled, 0);
}

#[test]
fn outliers_are_screened_before_classification() {
    let input = readings(
        Station::Edmonton,
        &[Some(1.0), Some(2.0), Some(55.0), Some(4.0)],
    );
    let (classified, outliers) = classify_station(
        Station::Edmonton,
        &input,
        &grid(4),
        DEFAULT_OUTLIER_THRESHOLD_CELSIUS,
    )
    .expect("classification should succeed");

    assert_eq!(outliers.screened, vec![at(2)]);
    assert_eq!(classified.tags.len(), 1);
    assert_eq!(classified.tags[0].kind, GapKind::Isolated);

    let (filled, _) = backfill_station(&classified);
    assert_eq!(filled.values[2], Some(2.0));
}

#[test]
fn threshold_itself_is_kept() {
    let input = readings(Station::Calgary, &[Some(40.0), Some(40.1)]);
    let (classified, outliers) =
        classify_station(Station::Calgary, &input, &grid(2), 40.0).expect("should classify");
    assert_eq!(outliers.screened, vec![at(1)]);
    assert_eq!(classified.series.values[0], Some(40.0));
}

#[test]
fn missing_grid_hours_become_gaps() {
    let mut input = readings(Station::Lethbridge, &[Some(1.0), Some(2.0), Some(3.0)]);
    input.remove(1);
    let series = join_onto_grid(Station::Lethbridge, &input, &grid(3)).expect("join");
    assert_eq!(series.values, vec![Some(1.0), None, Some(3.0)]);
    assert_eq!(series.timestamps.len(), 3);
}

#[test]
fn join_rejects_duplicates_misalignment_and_empty_series() {
    let mut duplicated = readings(Station::Calgary, &[Some(1.0), Some(2.0)]);
    duplicated.push(duplicated[0].clone());
    assert!(matches!(
        join_onto_grid(Station::Calgary, &duplicated, &grid(2)),
        Err(GapError::DuplicateTimestamp { .. })
    ));

    let misaligned = vec![StationReading {
        station: Station::Calgary,
        timestamp: at(0) + TimeDelta::minutes(30),
        temperature_celsius: Some(1.0),
    }];
    assert!(matches!(
        join_onto_grid(Station::Calgary, &misaligned, &grid(2)),
        Err(GapError::MisalignedTimestamp { .. })
    ));

    let off_grid = vec![StationReading {
        station: Station::Calgary,
        timestamp: at(100),
        temperature_celsius: Some(1.0),
    }];
    assert_eq!(
        join_onto_grid(Station::Calgary, &off_grid, &grid(2)),
        Err(GapError::EmptyStationSeries {
            station: Station::Calgary
        })
    );

    let wrong_station = readings(Station::Edmonton, &[Some(1.0)]);
    assert!(matches!(
        join_onto_grid(Station::Calgary, &wrong_station, &grid(2)),
        Err(GapError::StationMismatch { .. })
    ));
}

#[test]
fn station_with_only_blank_values_is_rejected() {
    let blanks = readings(Station::FortMcMurray, &[None, None, None]);
    assert_eq!(
        join_onto_grid(Station::FortMcMurray, &blanks, &grid(3)),
        Err(GapError::EmptyStationSeries {
            station: Station::FortMcMurray
        })
    );

    let one_present = readings(Station::FortMcMurray, &[None, Some(-2.0), None]);
    let series = join_onto_grid(Station::FortMcMurray, &one_present, &grid(3)).expect("join");
    assert_eq!(series.values, vec![None, Some(-2.0), None]);
}
