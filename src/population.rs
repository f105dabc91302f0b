//! Population-share tables keyed by (region, year, growth scenario).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::station::RegionId;

pub const DEFAULT_SHARE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Low,
    Medium,
    High,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Low, Scenario::Medium, Scenario::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

pub fn parse_scenario(input: &str) -> Result<Scenario, PopulationError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "low" | "pop_low" => Ok(Scenario::Low),
        "medium" | "pop_medium" => Ok(Scenario::Medium),
        "high" | "pop_high" => Ok(Scenario::High),
        other => Err(PopulationError::UnknownScenario(other.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionWeight {
    pub region: RegionId,
    pub year: i32,
    pub scenario: Scenario,
    pub share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCount {
    pub region: RegionId,
    pub year: i32,
    pub scenario: Scenario,
    pub population: u64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PopulationError {
    #[error("unknown population scenario: {0}")]
    UnknownScenario(String),
    #[error("share {share} for region {region} in {year}/{scenario:?} is outside [0, 1]")]
    InvalidShare {
        region: RegionId,
        year: i32,
        scenario: Scenario,
        share: f64,
    },
    #[error("duplicate share for region {region} in {year}/{scenario:?}")]
    DuplicateWeight {
        region: RegionId,
        year: i32,
        scenario: Scenario,
    },
    #[error("shares for {year}/{scenario:?} sum to {sum}, expected 1 within {tolerance}")]
    SharesDoNotSumToOne {
        year: i32,
        scenario: Scenario,
        sum: f64,
        tolerance: f64,
    },
    #[error("total population for {year}/{scenario:?} is zero")]
    ZeroPopulation { year: i32, scenario: Scenario },
    #[error("no population share for region {region} in {year}/{scenario:?}")]
    MissingWeight {
        region: RegionId,
        year: i32,
        scenario: Scenario,
    },
}

/// Lookup of a region's population share for a year and scenario.
pub trait PopulationShares {
    fn share(&self, region: RegionId, year: i32, scenario: Scenario) -> Option<f64>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionWeightTable {
    shares: BTreeMap<(i32, Scenario, RegionId), f64>,
}

impl RegionWeightTable {
    /// Builds a table from precomputed shares, rejecting any (year, scenario)
    /// whose shares do not sum to one within `tolerance`.
    pub fn from_weights(
        weights: &[RegionWeight],
        tolerance: f64,
    ) -> Result<Self, PopulationError> {
        let mut shares = BTreeMap::new();
        for weight in weights {
            if !weight.share.is_finite() || !(0.0..=1.0).contains(&weight.share) {
                return Err(PopulationError::InvalidShare {
                    region: weight.region,
                    year: weight.year,
                    scenario: weight.scenario,
                    share: weight.share,
                });
            }
            let key = (weight.year, weight.scenario, weight.region);
            if shares.insert(key, weight.share).is_some() {
                return Err(PopulationError::DuplicateWeight {
                    region: weight.region,
                    year: weight.year,
                    scenario: weight.scenario,
                });
            }
        }

        let table = Self { shares };
        table.validate(tolerance)?;
        Ok(table)
    }

    /// Derives shares from raw projections: counts are summed per
    /// (year, scenario, region) and divided by the (year, scenario) total.
    ///
    /// Only `regions` and years at or after `min_year` are kept.
    pub fn from_counts(
        counts: &[PopulationCount],
        regions: &[RegionId],
        min_year: i32,
    ) -> Result<Self, PopulationError> {
        let wanted: BTreeSet<RegionId> = regions.iter().copied().collect();
        let mut per_region: BTreeMap<(i32, Scenario, RegionId), u64> = BTreeMap::new();
        let mut totals: BTreeMap<(i32, Scenario), u64> = BTreeMap::new();

        for count in counts
            .iter()
            .filter(|count| count.year >= min_year && wanted.contains(&count.region))
        {
            *per_region
                .entry((count.year, count.scenario, count.region))
                .or_insert(0) += count.population;
            *totals.entry((count.year, count.scenario)).or_insert(0) += count.population;
        }

        let mut shares = BTreeMap::new();
        for ((year, scenario, region), population) in per_region {
            let total = totals.get(&(year, scenario)).copied().unwrap_or(0);
            if total == 0 {
                return Err(PopulationError::ZeroPopulation { year, scenario });
            }
            shares.insert((year, scenario, region), population as f64 / total as f64);
        }

        let table = Self { shares };
        info!(
            component = "population",
            event = "population.shares.built",
            entries = table.len(),
            years = table.years().len()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.shares.keys().map(|(year, _, _)| *year).collect()
    }

    /// Shares for one (year, scenario), ordered by region.
    pub fn shares_for(&self, year: i32, scenario: Scenario) -> Vec<RegionWeight> {
        self.shares
            .iter()
            .filter(|((y, s, _), _)| *y == year && *s == scenario)
            .map(|((year, scenario, region), share)| RegionWeight {
                region: *region,
                year: *year,
                scenario: *scenario,
                share: *share,
            })
            .collect()
    }

    pub fn validate(&self, tolerance: f64) -> Result<(), PopulationError> {
        let mut sums: BTreeMap<(i32, Scenario), f64> = BTreeMap::new();
        for ((year, scenario, _), share) in &self.shares {
            *sums.entry((*year, *scenario)).or_insert(0.0) += share;
        }
        for ((year, scenario), sum) in sums {
            if (sum - 1.0).abs() > tolerance {
                return Err(PopulationError::SharesDoNotSumToOne {
                    year,
                    scenario,
                    sum,
                    tolerance,
                });
            }
        }
        Ok(())
    }
}

impl PopulationShares for RegionWeightTable {
    fn share(&self, region: RegionId, year: i32, scenario: Scenario) -> Option<f64> {
        self.shares.get(&(year, scenario, region)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_parsing_accepts_source_column_names() {
        assert_eq!(parse_scenario("pop_medium").unwrap(), Scenario::Medium);
        assert_eq!(parse_scenario(" HIGH ").unwrap(), Scenario::High);
        assert!(matches!(
            parse_scenario("extreme"),
            Err(PopulationError::UnknownScenario(_))
        ));
    }

    #[test]
    fn counts_are_summed_before_normalizing() {
        let counts = [
            PopulationCount {
                region: RegionId(6),
                year: 2010,
                scenario: Scenario::Low,
                population: 100,
            },
            PopulationCount {
                region: RegionId(6),
                year: 2010,
                scenario: Scenario::Low,
                population: 200,
            },
            PopulationCount {
                region: RegionId(11),
                year: 2010,
                scenario: Scenario::Low,
                population: 100,
            },
        ];
        let table =
            RegionWeightTable::from_counts(&counts, &[RegionId(6), RegionId(11)], 2010).unwrap();
        assert_eq!(table.share(RegionId(6), 2010, Scenario::Low), Some(0.75));
        assert_eq!(table.share(RegionId(11), 2010, Scenario::Low), Some(0.25));
    }
}
