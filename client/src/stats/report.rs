use super::{
    sample::{
        ErrorRecord,
        IdentityKey,
        Totals,
    },
    AggregateError,
};
use crate::{
    duration::format_seconds,
    render::{
        render_table,
        Record,
    },
};
use comfy_table::Table;
use profile_client_config::SortKey;
use serde_json::{
    json,
    Value,
};
use std::cmp::Ordering;
use strum::{
    Display,
    EnumIter,
    IntoEnumIterator,
    IntoStaticStr,
};

/// Columns of the stats report, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    Host,
    File,
    FuncName,
    NumCalls,
    TotalTime,
    CumTime,
    TotalTimePerCall,
    CumTimePerCall,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

impl From<SortKey> for Column {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::CumTime => Column::CumTime,
            SortKey::TotalTime => Column::TotalTime,
            SortKey::NumCalls => Column::NumCalls,
            SortKey::CumTimePerCall => Column::CumTimePerCall,
            SortKey::TotalTimePerCall => Column::TotalTimePerCall,
        }
    }
}

/// One line of the stats report. `host` is `None` once samples were merged across servers.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub host: Option<String>,
    pub key: IdentityKey,
    pub totals: Totals,
    pub total_time_per_call: f64,
    pub cum_time_per_call: f64,
}

impl StatRow {
    pub fn new(host: Option<String>, key: IdentityKey, totals: Totals) -> Result<Self, AggregateError> {
        if totals.num_calls == 0 {
            return Err(AggregateError::ZeroCalls {
                path: key.path,
                line: key.line,
                func_name: key.func_name,
            });
        }
        let calls = totals.num_calls as f64;
        Ok(Self {
            total_time_per_call: totals.total_time / calls,
            cum_time_per_call: totals.cum_time / calls,
            host,
            key,
            totals,
        })
    }

    pub fn file(&self) -> String {
        format!("{}:{}", self.key.path, self.key.line)
    }

    pub fn has(&self, column: Column) -> bool {
        column != Column::Host || self.host.is_some()
    }

    fn compare(&self, other: &Self, column: Column) -> Ordering {
        match column {
            Column::Host => self.host.cmp(&other.host),
            Column::File => self.file().cmp(&other.file()),
            Column::FuncName => self.key.func_name.cmp(&other.key.func_name),
            Column::NumCalls => self.totals.num_calls.cmp(&other.totals.num_calls),
            Column::TotalTime => self.totals.total_time.total_cmp(&other.totals.total_time),
            Column::CumTime => self.totals.cum_time.total_cmp(&other.totals.cum_time),
            Column::TotalTimePerCall => self.total_time_per_call.total_cmp(&other.total_time_per_call),
            Column::CumTimePerCall => self.cum_time_per_call.total_cmp(&other.cum_time_per_call),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(host) = &self.host {
            record.insert(Column::Host.as_str().to_string(), Value::String(host.clone()));
        }
        let fields = [
            (Column::File, Value::String(self.file())),
            (Column::FuncName, Value::String(self.key.func_name.clone())),
            (Column::NumCalls, Value::from(self.totals.num_calls)),
            (Column::TotalTime, Value::String(format_seconds(self.totals.total_time))),
            (Column::CumTime, Value::String(format_seconds(self.totals.cum_time))),
            (
                Column::TotalTimePerCall,
                Value::String(format_seconds(self.total_time_per_call)),
            ),
            (Column::CumTimePerCall, Value::String(format_seconds(self.cum_time_per_call))),
        ];
        for (column, value) in fields {
            record.insert(column.as_str().to_string(), value);
        }
        record
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsReport {
    /// Servers that failed, in host order.
    pub errors: Vec<ErrorRecord>,
    pub rows: Vec<StatRow>,
    pub merged: bool,
}

impl StatsReport {
    /// `true` when no server delivered a single statistic.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> Vec<Column> {
        Column::iter()
            .filter(|column| self.rows.iter().any(|row| row.has(*column)))
            .collect()
    }

    /// Stable descending sort by `column`. Rows keep their order if no row has that column.
    pub fn order_by(&mut self, column: Column) -> bool {
        if !self.columns().contains(&column) {
            debug!(%column, "sort column not in report, keeping encounter order");
            return false;
        }
        self.rows.sort_by(|a, b| b.compare(a, column));
        true
    }

    pub fn records(&self) -> Vec<Record> {
        self.rows.iter().map(StatRow::to_record).collect()
    }

    pub fn error_records(&self) -> Vec<Record> {
        self.errors.iter().map(ErrorRecord::to_record).collect()
    }

    pub fn table(&self) -> Table {
        let preferred: Vec<&str> = Column::iter().map(|column| column.as_str()).collect();
        render_table(&self.records(), &preferred, &[Column::NumCalls.as_str()])
    }

    /// Table of the failed servers, `None` if every server answered.
    pub fn error_table(&self) -> Option<Table> {
        if self.errors.is_empty() {
            return None;
        }
        Some(render_table(&self.error_records(), &[Column::Host.as_str()], &[]))
    }

    /// The report as JSON, rows in display order.
    pub fn summary(&self) -> Value {
        json!({
            "merged": self.merged,
            "errors": self.errors,
            "statistics": self.records(),
        })
    }
}
