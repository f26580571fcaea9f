//! Reassembly of records from single-field query rows.
//!
//! The server returns one row per (point, field). Rows are folded into
//! accumulators keyed by [`RecordKey`]; which columns make up the key is
//! chosen by [`Grouping`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::annotated::{FluxRecord, Value};
use crate::error::{Error, Result};
use crate::point::Point;

/// How rows are grouped into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// Timestamp plus every tag value of the row. Records never collide.
    #[default]
    Identity,
    /// Timestamp only. Identities sharing a timestamp collapse into one record
    /// carrying the identity of the last row seen.
    Timestamp,
}

impl FromStr for Grouping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(Grouping::Identity),
            "timestamp" => Ok(Grouping::Timestamp),
            other => Err(Error::Config(format!(
                "unknown grouping {other:?}, expected identity or timestamp"
            ))),
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Identity => f.write_str("identity"),
            Grouping::Timestamp => f.write_str("timestamp"),
        }
    }
}

/// Accumulator key. `identity` holds the row's `tag=value` pairs in column
/// order and is empty under [`Grouping::Timestamp`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub time: OffsetDateTime,
    pub identity: Vec<String>,
}

impl RecordKey {
    pub fn at(time: OffsetDateTime) -> Self {
        Self {
            time,
            identity: Vec::new(),
        }
    }

    pub fn new(time: OffsetDateTime, identity: Vec<String>) -> Self {
        Self { time, identity }
    }
}

/// A domain type stored as one point per value, one row per field on read.
pub trait Record: Sized {
    /// Measurement the record is written under.
    const MEASUREMENT: &'static str;

    /// Numeric fields understood by [`Record::set_field`].
    const FIELDS: &'static [&'static str];

    fn to_point(&self) -> Point;

    /// Fresh accumulator for the first row seen under a key.
    fn seed(time: OffsetDateTime, row: &FluxRecord) -> Self;

    /// Copy the row's identity tags into the accumulator.
    fn assign_identity(&mut self, row: &FluxRecord);

    /// Store `value` under `field`. Returns false for unknown fields.
    fn set_field(&mut self, field: &str, value: f64) -> bool;
}

/// `tag=value` for every tag column of `row`.
pub fn row_identity(row: &FluxRecord) -> Vec<String> {
    row.tags().map(|(key, value)| format!("{key}={value}")).collect()
}

/// Fold query rows into records.
///
/// Rows missing `_time` or `_field`, rows with a non-numeric `_value` and rows
/// naming an unknown field are skipped with a warning; the remaining rows are
/// still merged.
pub fn merge_rows<R, I>(rows: I, grouping: Grouping) -> BTreeMap<RecordKey, R>
where
    R: Record,
    I: IntoIterator<Item = FluxRecord>,
{
    let mut records: BTreeMap<RecordKey, R> = BTreeMap::new();

    for row in rows {
        let Some(time) = row.time() else {
            warn!("{}: skipping row without _time", R::MEASUREMENT);
            continue;
        };
        let Some(field) = row.field() else {
            warn!("{}: skipping row without _field at {time}", R::MEASUREMENT);
            continue;
        };

        let key = match grouping {
            Grouping::Identity => RecordKey::new(time, row_identity(&row)),
            Grouping::Timestamp => RecordKey::at(time),
        };
        let record = records
            .entry(key)
            .or_insert_with(|| R::seed(time, &row));
        record.assign_identity(&row);

        let Some(value) = row.value().and_then(Value::as_f64) else {
            warn!(
                "{}: field {field} at {time} has no numeric value",
                R::MEASUREMENT
            );
            continue;
        };
        if !record.set_field(field, value) {
            warn!(
                "{}: unknown field {field} at {time}, expected one of {:?}",
                R::MEASUREMENT,
                R::FIELDS
            );
        }
    }

    records
}
