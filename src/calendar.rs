//! Calendar features, holiday calendars, and fixed one-hot encodings.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::merge::MergedRecord;
use crate::schema::CanonicalRecord;

pub const HOURS_PER_DAY: u32 = 24;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Answers whether a date is a public holiday.
pub trait HolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool;
}

/// Canadian statutory holidays computed from rules.
///
/// Covers New Year's Day, Family Day (from 2008), Good Friday, Victoria Day,
/// Canada Day, Civic Holiday, Labour Day, Thanksgiving, Christmas Day and
/// Boxing Day. Both the actual date and the observed weekday count.
///
/// Observed days:
/// - New Year's Day on a Sunday is observed Monday January 2; on a Saturday
///   it is observed Friday December 31 of the previous year.
/// - Canada Day on a Saturday or Sunday is observed the following Monday.
/// - Christmas Day on a Saturday is observed Friday December 24; on a Sunday
///   it is observed Monday December 26.
/// - Boxing Day on a Saturday or Sunday is observed the following Monday; on
///   a Monday (Christmas on Sunday) Tuesday December 27 is added as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanadianHolidays;

impl HolidayCalendar for CanadianHolidays {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        canadian_holidays(date.year()).contains(&date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedHolidayCalendar {
    dates: BTreeSet<NaiveDate>,
}

impl FixedHolidayCalendar {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }
}

impl HolidayCalendar for FixedHolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFeatures {
    pub hour: u32,
    /// 0 = Monday.
    pub weekday: u32,
    pub month: u32,
    pub year: i32,
    pub holiday: bool,
    pub working_day: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar encoding range is empty: [{start}, {end_exclusive})")]
    EmptyRange {
        start: NaiveDateTime,
        end_exclusive: NaiveDateTime,
    },
    #[error("year {year} is outside the encoded range {first_year}..={last_year}")]
    YearOutsideEncoding {
        year: i32,
        first_year: i32,
        last_year: i32,
    },
}

pub fn calendar_features(ts: NaiveDateTime, calendar: &dyn HolidayCalendar) -> CalendarFeatures {
    let weekday = ts.weekday().num_days_from_monday();
    let holiday = calendar.is_holiday(ts.date());
    CalendarFeatures {
        hour: ts.hour(),
        weekday,
        month: ts.month(),
        year: ts.year(),
        holiday,
        working_day: !holiday && weekday < 5,
    }
}

/// Fixed indicator layout: 24 hours, 7 weekdays, 12 months, then one column
/// per calendar year touched by the configured horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEncoding {
    first_year: i32,
    last_year: i32,
}

impl CalendarEncoding {
    pub fn for_horizon(
        start: NaiveDateTime,
        end_exclusive: NaiveDateTime,
    ) -> Result<Self, CalendarError> {
        if end_exclusive <= start {
            return Err(CalendarError::EmptyRange {
                start,
                end_exclusive,
            });
        }
        let last_instant = end_exclusive - chrono::TimeDelta::nanoseconds(1);
        Ok(Self {
            first_year: start.year(),
            last_year: last_instant.year(),
        })
    }

    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn last_year(&self) -> i32 {
        self.last_year
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.first_year..=self.last_year
    }

    pub fn width(&self) -> usize {
        HOURS_PER_DAY as usize
            + WEEKDAY_NAMES.len()
            + MONTH_NAMES.len()
            + (self.last_year - self.first_year + 1) as usize
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        names.extend((0..HOURS_PER_DAY).map(|hour| format!("hour_{hour:02}")));
        names.extend(WEEKDAY_NAMES.iter().map(|name| name.to_string()));
        names.extend(MONTH_NAMES.iter().map(|name| name.to_string()));
        names.extend(self.years().map(|year| format!("year_{year}")));
        names
    }

    pub fn encode(&self, features: &CalendarFeatures) -> Result<Vec<bool>, CalendarError> {
        if features.year < self.first_year || features.year > self.last_year {
            return Err(CalendarError::YearOutsideEncoding {
                year: features.year,
                first_year: self.first_year,
                last_year: self.last_year,
            });
        }
        let mut indicators = Vec::with_capacity(self.width());
        indicators.extend((0..HOURS_PER_DAY).map(|hour| hour == features.hour));
        indicators.extend((0..WEEKDAY_NAMES.len() as u32).map(|day| day == features.weekday));
        indicators.extend((1..=MONTH_NAMES.len() as u32).map(|month| month == features.month));
        indicators.extend(self.years().map(|year| year == features.year));
        Ok(indicators)
    }
}

/// Derives calendar fields and indicators for every merged row.
pub fn attach_calendar(
    merged: Vec<MergedRecord>,
    calendar: &dyn HolidayCalendar,
    encoding: &CalendarEncoding,
) -> Result<Vec<CanonicalRecord>, CalendarError> {
    let mut holidays = 0usize;
    let mut out = Vec::with_capacity(merged.len());
    for record in merged {
        let features = calendar_features(record.timestamp, calendar);
        if features.holiday {
            holidays += 1;
        }
        let indicators = encoding.encode(&features)?;
        out.push(CanonicalRecord {
            merged: record,
            calendar: features,
            indicators,
        });
    }

    info!(
        component = "calendar",
        event = "calendar.attach.finish",
        rows = out.len(),
        holiday_hours = holidays,
        indicator_columns = encoding.width()
    );

    Ok(out)
}

pub fn canadian_holidays(year: i32) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut push = |date: Option<NaiveDate>| {
        if let Some(date) = date {
            dates.push(date);
        }
    };

    let new_year = NaiveDate::from_ymd_opt(year, 1, 1);
    push(new_year);
    push(
        new_year
            .filter(|date| date.weekday() == Weekday::Sun)
            .and_then(|date| date.succ_opt()),
    );
    // Next year's New Year's Day falls on a Saturday.
    push(NaiveDate::from_ymd_opt(year, 12, 31).filter(|date| date.weekday() == Weekday::Fri));

    if year >= 2008 {
        push(NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3));
    }

    push(easter_sunday(year).and_then(|easter| easter.checked_sub_days(Days::new(2))));

    push(NaiveDate::from_ymd_opt(year, 5, 24).map(monday_on_or_before));

    let canada_day = NaiveDate::from_ymd_opt(year, 7, 1);
    push(canada_day);
    push(canada_day.and_then(following_monday_if_weekend));

    push(NaiveDate::from_weekday_of_month_opt(year, 8, Weekday::Mon, 1));
    push(NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1));
    push(NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2));

    let christmas = NaiveDate::from_ymd_opt(year, 12, 25);
    push(christmas);
    push(christmas.and_then(|date| match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => None,
    }));

    let boxing_day = NaiveDate::from_ymd_opt(year, 12, 26);
    push(boxing_day);
    push(boxing_day.and_then(|date| match date.weekday() {
        Weekday::Sat | Weekday::Sun => following_monday_if_weekend(date),
        Weekday::Mon => date.succ_opt(),
        _ => None,
    }));

    dates.sort();
    dates.dedup();
    dates
}

fn following_monday_if_weekend(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.checked_add_days(Days::new(2)),
        Weekday::Sun => date.checked_add_days(Days::new(1)),
        _ => None,
    }
}

fn monday_on_or_before(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Gregorian Easter Sunday (anonymous computus).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
