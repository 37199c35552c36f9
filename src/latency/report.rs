use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::StoreError;
use crate::settings::Settings;
use crate::store::{AggregateStore, Keys};

pub const DEFAULT_LIMIT: usize = 100;

/// Round to two decimals: `(x * 100).round() / 100`.
///
/// `f64::round` rounds half away from zero, applied to the binary product:
/// `2.005 * 100` is exactly `200.5` and formats as `2.01`, while
/// `1.005 * 100` is `100.49999999999999` and formats as `1.0`.
pub fn format_ms(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAverage {
    pub route: String,
    /// Rounded for display
    pub average: f64,
    pub count: u64,
}

/// Mean of the listed route averages, or `"n/a"` when nothing is listed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverallMean {
    Value(f64),
    NotAvailable,
}

impl Serialize for OverallMean {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::NotAvailable => serializer.serialize_str("n/a"),
        }
    }
}

impl fmt::Display for OverallMean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::NotAvailable => f.write_str("n/a"),
        }
    }
}

/// Derived on every query, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub settings: Settings,
    pub entries: Vec<RouteAverage>,
    pub overall_mean: OverallMean,
}

/// Read the top `limit` routes by average latency.
///
/// Read-only; the ranked score picks the candidates, and the displayed
/// average is recomputed from the authoritative `total / count`.
pub async fn build_report(
    store: &dyn AggregateStore,
    keys: &Keys,
    limit: usize,
) -> Result<Report, StoreError> {
    let (settings, ranked) = tokio::try_join!(
        Settings::load(store, keys),
        store.ranked_set_rev_range_by_score(&keys.scores, 0.0, None, limit),
    )?;

    let routes: Vec<String> = ranked.into_iter().map(|(route, _)| route).collect();
    let (counts, totals) = tokio::try_join!(
        store.hash_get_many(&keys.counts, &routes),
        store.hash_get_many(&keys.totals, &routes),
    )?;

    let mut rows: Vec<(String, f64, u64)> = routes
        .into_iter()
        .zip(counts.into_iter().zip(totals))
        .filter_map(|(route, (count, total))| {
            let count = count.filter(|&c| c >= 1.0)? as u64;
            let total = total.unwrap_or(0.0);
            Some((route, total / count as f64, count))
        })
        .collect();

    // The score index can lag a failed refresh; order by the derived value
    rows.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let overall_mean = if rows.is_empty() {
        OverallMean::NotAvailable
    } else {
        let sum: f64 = rows.iter().map(|(_, avg, _)| avg).sum();
        OverallMean::Value(format_ms(sum / rows.len() as f64))
    };

    let entries = rows
        .into_iter()
        .map(|(route, average, count)| RouteAverage {
            route,
            average: format_ms(average),
            count,
        })
        .collect();

    Ok(Report {
        settings,
        entries,
        overall_mean,
    })
}
