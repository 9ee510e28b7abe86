//! # Stats aggregation
//!
//! Turns the answers of `GET profiler/stats` from every server into one report:
//!
//! 1. **flatten**: nested `statistics` lists become one entry per function, inheriting the
//!    enclosing document's fields (at least `host`)
//! 2. **partition**: failed servers are split off in host order
//! 3. **merge** (optional): entries with the same `(path, line, func_name)` are summed and lose
//!    their `host`
//! 4. **derive**: per-call times are computed from the (summed) totals
//! 5. **order**: stable descending sort on the requested column, if the report has it
//!
//! Presentation (`file` column, duration formatting) happens in [`StatsReport::table`].

mod merge;
mod report;
mod sample;

pub use merge::{
    merge,
    MergedStat,
};
use profile_client_config::StatsConfig;
pub use report::{
    Column,
    StatRow,
    StatsReport,
};
pub use sample::{
    flatten,
    Entry,
    ErrorRecord,
    IdentityKey,
    StatSample,
    Totals,
};

use crate::remote::RemoteResult;

/// Malformed statistics. `InvalidField` only discards the offending host, the other variants abort
/// the whole report since merged sums would be wrong.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("statistics from {host} are missing the `{field}` field")]
    MissingField { host: String, field: String },
    #[error("statistics from {host} have an invalid `{field}` field: expected {expected}, got {found}")]
    InvalidField {
        host: String,
        field: String,
        expected: &'static str,
        found: String,
    },
    #[error("{path}:{line} {func_name} reports zero calls")]
    ZeroCalls { path: String, line: u64, func_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub merge: bool,
    pub order: Column,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            merge: true,
            order: Column::CumTime,
        }
    }
}

impl From<&StatsConfig> for AggregateOptions {
    fn from(settings: &StatsConfig) -> Self {
        Self {
            merge: settings.merge,
            order: settings.order.into(),
        }
    }
}

/// Builds the stats report from per-server results given in host order.
pub fn aggregate(results: Vec<RemoteResult>, options: AggregateOptions) -> Result<StatsReport, AggregateError> {
    let mut errors = Vec::new();
    let mut samples = Vec::new();
    for entry in flatten(results)? {
        match entry {
            Entry::Error(error) => errors.push(error),
            Entry::Sample(sample) => samples.push(sample),
        }
    }
    debug!(samples = samples.len(), errors = errors.len(), merge = options.merge, "aggregating statistics");

    let rows = if options.merge {
        merge(samples)
            .into_iter()
            .map(|stat| StatRow::new(None, stat.key, stat.totals))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        samples
            .into_iter()
            .map(|sample| StatRow::new(Some(sample.host), sample.key, sample.totals))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut report = StatsReport {
        errors,
        rows,
        merged: options.merge,
    };
    report.order_by(options.order);
    Ok(report)
}
