//! Weather stations of the reference deployment and their census divisions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STATION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Station {
    Calgary,
    Edmonton,
    FortMcMurray,
    Lethbridge,
}

/// Census division identifier used to key population shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u16);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StationError {
    #[error("unknown station: {0}")]
    UnknownStation(String),
}

impl Station {
    /// Column order of every per-station field in the canonical output.
    pub const ALL: [Station; STATION_COUNT] = [
        Station::Calgary,
        Station::Edmonton,
        Station::FortMcMurray,
        Station::Lethbridge,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Calgary => "calgary",
            Self::Edmonton => "edmonton",
            Self::FortMcMurray => "fort_mcmurray",
            Self::Lethbridge => "lethbridge",
        }
    }

    pub fn stream_name(self) -> &'static str {
        match self {
            Self::Calgary => "EC - Calgary Temp",
            Self::Edmonton => "EC - Edmonton Temp",
            Self::FortMcMurray => "EC - Fort McMurray Temp",
            Self::Lethbridge => "EC - Lethbridge Temp",
        }
    }

    pub fn region(self) -> RegionId {
        match self {
            Self::Calgary => RegionId(6),
            Self::Edmonton => RegionId(11),
            Self::FortMcMurray => RegionId(16),
            Self::Lethbridge => RegionId(2),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Calgary => 0,
            Self::Edmonton => 1,
            Self::FortMcMurray => 2,
            Self::Lethbridge => 3,
        }
    }
}

pub fn parse_station(input: &str) -> Result<Station, StationError> {
    let trimmed = input.trim();
    Station::ALL
        .into_iter()
        .find(|station| {
            station.code().eq_ignore_ascii_case(trimmed) || station.stream_name() == trimmed
        })
        .ok_or_else(|| StationError::UnknownStation(trimmed.to_string()))
}

pub fn station_regions() -> Vec<RegionId> {
    Station::ALL.iter().map(|station| station.region()).collect()
}
