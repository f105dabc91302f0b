//! Two-tier gap filling: previous hour for isolated gaps, same hour of the
//! previous day for contiguous runs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::gaps::{GapClassification, GapKind};
use crate::station::Station;

const ISOLATED_LOOKBACK_HOURS: usize = 1;
const CONTIGUOUS_LOOKBACK_HOURS: usize = 24;
const MAX_REPORTED_UNRESOLVED: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfilledSeries {
    pub station: Station,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub station: Station,
    pub isolated_filled: u64,
    pub contiguous_filled: u64,
    pub unresolved_total: u64,
    pub unresolved: Vec<NaiveDateTime>,
}

/// Single ascending pass over the classified gaps.
///
/// Contiguous fills read the already-filled series, so a multi-day outage
/// carries the last resolved day forward. A lookback that lands before the
/// first grid hour, or on a value that is still unresolved, leaves the gap
/// unresolved.
pub fn backfill_station(classification: &GapClassification) -> (BackfilledSeries, BackfillReport) {
    let station = classification.series.station;
    let mut filled = classification.series.values.clone();
    let mut report = BackfillReport {
        station,
        isolated_filled: 0,
        contiguous_filled: 0,
        unresolved_total: 0,
        unresolved: Vec::new(),
    };

    for tag in &classification.tags {
        let lookback = match tag.kind {
            GapKind::Isolated => ISOLATED_LOOKBACK_HOURS,
            GapKind::Contiguous => CONTIGUOUS_LOOKBACK_HOURS,
        };
        let resolved = tag
            .index
            .checked_sub(lookback)
            .and_then(|source| filled[source]);

        match resolved {
            Some(value) => {
                filled[tag.index] = Some(value);
                match tag.kind {
                    GapKind::Isolated => report.isolated_filled += 1,
                    GapKind::Contiguous => report.contiguous_filled += 1,
                }
            }
            None => {
                debug!(
                    component = "backfill",
                    event = "backfill.gap.unresolved",
                    station = station.code(),
                    timestamp = %tag.timestamp,
                    kind = ?tag.kind
                );
                report.unresolved_total += 1;
                if report.unresolved.len() < MAX_REPORTED_UNRESOLVED {
                    report.unresolved.push(tag.timestamp);
                }
            }
        }
    }

    if report.unresolved_total > 0 {
        warn!(
            component = "backfill",
            event = "backfill.station.unresolved",
            station = station.code(),
            unresolved = report.unresolved_total,
            first_unresolved = ?report.unresolved.first()
        );
    }

    info!(
        component = "backfill",
        event = "backfill.station.finish",
        station = station.code(),
        isolated_filled = report.isolated_filled,
        contiguous_filled = report.contiguous_filled,
        unresolved = report.unresolved_total
    );

    (
        BackfilledSeries {
            station,
            timestamps: classification.series.timestamps.clone(),
            values: filled,
        },
        report,
    )
}
