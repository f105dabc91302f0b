//! Canonical hourly timeline shared by every downstream stage.

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const HOUR_SECONDS: i64 = 3_600;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("invalid grid range: {0}")]
    InvalidRange(String),
}

/// Ordered, gap-free hourly instants over a closed range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyGrid {
    start: NaiveDateTime,
    end: NaiveDateTime,
    timestamps: Vec<NaiveDateTime>,
}

impl HourlyGrid {
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.timestamps.iter().copied()
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.position(ts).is_some()
    }

    /// Index of `ts` on the grid, or `None` when it is off-grid or misaligned.
    pub fn position(&self, ts: NaiveDateTime) -> Option<usize> {
        if ts < self.start || ts > self.end || !is_hour_aligned(ts) {
            return None;
        }
        let offset = (ts - self.start).num_hours();
        usize::try_from(offset).ok()
    }
}

pub fn is_hour_aligned(ts: NaiveDateTime) -> bool {
    ts.minute() == 0 && ts.second() == 0 && ts.nanosecond() == 0
}

pub fn build_hourly_grid(
    start: NaiveDateTime,
    end_inclusive: NaiveDateTime,
) -> Result<HourlyGrid, GridError> {
    if end_inclusive < start {
        return Err(GridError::InvalidRange(format!(
            "end {end_inclusive} is before start {start}"
        )));
    }
    if !is_hour_aligned(start) || !is_hour_aligned(end_inclusive) {
        return Err(GridError::InvalidRange(format!(
            "bounds must be hour aligned (start={start}, end={end_inclusive})"
        )));
    }

    let hours = (end_inclusive - start).num_hours();
    let len = usize::try_from(hours + 1)
        .map_err(|_| GridError::InvalidRange(format!("grid length overflow: {hours}")))?;
    let step = TimeDelta::hours(1);

    let mut timestamps = Vec::with_capacity(len);
    let mut cursor = start;
    while cursor <= end_inclusive {
        timestamps.push(cursor);
        cursor = cursor.checked_add_signed(step).ok_or_else(|| {
            GridError::InvalidRange(format!("timestamp overflow after {cursor}"))
        })?;
    }

    info!(
        component = "grid",
        event = "grid.build.finish",
        start = %start,
        end = %end_inclusive,
        points = timestamps.len()
    );

    Ok(HourlyGrid {
        start,
        end: end_inclusive,
        timestamps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2010, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn grid_length_is_hours_between_bounds_plus_one() {
        let grid = build_hourly_grid(at(1, 0, 0), at(2, 5, 0)).unwrap();
        assert_eq!(grid.len(), 30);
        assert_eq!(grid.timestamps()[0], at(1, 0, 0));
        assert_eq!(grid.timestamps()[29], at(2, 5, 0));
        assert!(grid.timestamps().windows(2).all(|w| w[1] - w[0] == TimeDelta::hours(1)));
    }

    #[test]
    fn single_point_grid_is_allowed() {
        let grid = build_hourly_grid(at(1, 3, 0), at(1, 3, 0)).unwrap();
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn reversed_or_misaligned_bounds_are_rejected() {
        assert!(matches!(
            build_hourly_grid(at(2, 0, 0), at(1, 0, 0)),
            Err(GridError::InvalidRange(_))
        ));
        assert!(matches!(
            build_hourly_grid(at(1, 0, 30), at(1, 5, 0)),
            Err(GridError::InvalidRange(_))
        ));
    }

    #[test]
    fn position_rejects_off_grid_instants() {
        let grid = build_hourly_grid(at(1, 0, 0), at(1, 5, 0)).unwrap();
        assert_eq!(grid.position(at(1, 3, 0)), Some(3));
        assert_eq!(grid.position(at(1, 3, 15)), None);
        assert_eq!(grid.position(at(1, 6, 0)), None);
    }
}
