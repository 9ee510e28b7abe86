use super::AggregateError;
use crate::{
    remote::{
        Outcome,
        Payload,
        RemoteResult,
    },
    render::{
        cell_text,
        Record,
        ERROR_COLUMN,
    },
};
use serde::Serialize;
use serde_json::Value;
use std::ops::AddAssign;

/// Field of a stats document that holds the per-function entries.
pub const STATISTICS_FIELD: &str = "statistics";

/// Identifies a profiled call site. Assumed stable across servers running the same code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub path: String,
    pub line: u64,
    pub func_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    /// Self time in seconds.
    pub total_time: f64,
    /// Time including callees in seconds.
    pub cum_time: f64,
    pub num_calls: u64,
}

impl AddAssign for Totals {
    fn add_assign(&mut self, other: Self) {
        self.total_time += other.total_time;
        self.cum_time += other.cum_time;
        self.num_calls += other.num_calls;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatSample {
    pub host: String,
    pub key: IdentityKey,
    pub totals: Totals,
}

/// A server that could not deliver statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub host: String,
    pub error: String,
}

impl ErrorRecord {
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("host".to_string(), Value::String(self.host.clone()));
        record.insert(ERROR_COLUMN.to_string(), Value::String(self.error.clone()));
        record
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Error(ErrorRecord),
    Sample(StatSample),
}

/// Expands every stats document into one entry per profiled function.
///
/// Fields of the enclosing document (at least `host`) are copied onto each nested entry unless
/// the entry already carries them. A document with a mistyped field is reported as an error for
/// its host only, while missing fields abort the whole run.
pub fn flatten(results: Vec<RemoteResult>) -> Result<Vec<Entry>, AggregateError> {
    let mut entries = Vec::new();
    for RemoteResult { host, outcome } in results {
        let document = match outcome {
            Outcome::Error(err) => {
                entries.push(Entry::Error(ErrorRecord {
                    host,
                    error: err.to_string(),
                }));
                continue;
            }
            Outcome::Payload(Payload::Document(Value::Object(document))) => document,
            Outcome::Payload(Payload::Document(other)) => {
                entries.push(Entry::Error(ErrorRecord {
                    host,
                    error: format!("expected a JSON object, got {other}"),
                }));
                continue;
            }
            Outcome::Payload(Payload::Text(text)) => {
                entries.push(Entry::Error(ErrorRecord {
                    host,
                    error: format!("expected a JSON document, got '{text}'"),
                }));
                continue;
            }
        };

        match flatten_document(&host, document) {
            Ok(found) => entries.extend(found),
            Err(err @ AggregateError::InvalidField { .. }) => {
                warn!(host = %host, error = %err, "discarding statistics");
                entries.push(Entry::Error(ErrorRecord {
                    host,
                    error: err.to_string(),
                }));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(entries)
}

fn flatten_document(host: &str, mut document: Record) -> Result<Vec<Entry>, AggregateError> {
    document.insert("host".to_string(), Value::String(host.to_string()));
    let items = match document.remove(STATISTICS_FIELD) {
        None => return Ok(vec![parse_entry(host, &document)?]),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(AggregateError::InvalidField {
                host: host.to_string(),
                field: STATISTICS_FIELD.to_string(),
                expected: "an array",
                found: other.to_string(),
            });
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let mut item = match item {
            Value::Object(item) => item,
            other => {
                return Err(AggregateError::InvalidField {
                    host: host.to_string(),
                    field: format!("{STATISTICS_FIELD}[{index}]"),
                    expected: "an object",
                    found: other.to_string(),
                });
            }
        };
        for (field, value) in &document {
            if !item.contains_key(field) {
                item.insert(field.clone(), value.clone());
            }
        }
        entries.push(parse_entry(host, &item)?);
    }
    Ok(entries)
}

fn parse_entry(origin: &str, fields: &Record) -> Result<Entry, AggregateError> {
    let host = match fields.get("host") {
        Some(Value::String(host)) => host.clone(),
        _ => origin.to_string(),
    };
    if let Some(error) = fields.get(ERROR_COLUMN) {
        return Ok(Entry::Error(ErrorRecord {
            host,
            error: cell_text(error),
        }));
    }

    let reader = FieldReader { host: &host, fields };
    let key = IdentityKey {
        path: reader.string("path")?,
        line: reader.unsigned("line")?,
        func_name: reader.string("func_name")?,
    };
    let totals = Totals {
        total_time: reader.float("total_time")?,
        cum_time: reader.float("cum_time")?,
        num_calls: reader.unsigned("num_calls")?,
    };
    Ok(Entry::Sample(StatSample { host, key, totals }))
}

struct FieldReader<'a> {
    host: &'a str,
    fields: &'a Record,
}

impl FieldReader<'_> {
    fn required(&self, field: &str) -> Result<&Value, AggregateError> {
        self.fields.get(field).ok_or_else(|| AggregateError::MissingField {
            host: self.host.to_string(),
            field: field.to_string(),
        })
    }

    fn invalid(&self, field: &str, expected: &'static str, found: &Value) -> AggregateError {
        AggregateError::InvalidField {
            host: self.host.to_string(),
            field: field.to_string(),
            expected,
            found: found.to_string(),
        }
    }

    fn string(&self, field: &str) -> Result<String, AggregateError> {
        let value = self.required(field)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(field, "a string", value))
    }

    fn unsigned(&self, field: &str) -> Result<u64, AggregateError> {
        let value = self.required(field)?;
        value
            .as_u64()
            .ok_or_else(|| self.invalid(field, "a non-negative integer", value))
    }

    fn float(&self, field: &str) -> Result<f64, AggregateError> {
        let value = self.required(field)?;
        value.as_f64().ok_or_else(|| self.invalid(field, "a number", value))
    }
}
