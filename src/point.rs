//! Points and their line protocol encoding.
//!
//! A [`Point`] is one measurement with a tag set, a field set and an optional
//! timestamp. Every write path in the crate goes through [`Point::to_line`],
//! whether the point was assembled from collections or built fluently.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use time::OffsetDateTime;

use crate::error::{Error, Result};

/// Timestamp resolution of encoded points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
}

impl Precision {
    /// Value of the `precision` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Nanoseconds => "ns",
            Precision::Microseconds => "us",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
        }
    }

    fn divisor(self) -> i128 {
        match self {
            Precision::Nanoseconds => 1,
            Precision::Microseconds => 1_000,
            Precision::Milliseconds => 1_000_000,
            Precision::Seconds => 1_000_000_000,
        }
    }

    /// Timestamp in this precision's units since the unix epoch.
    pub fn encode(self, time: OffsetDateTime) -> i128 {
        time.unix_timestamp_nanos().div_euclid(self.divisor())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    UInteger(u64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::UInteger(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            FieldValue::Float(v) => out.push_str(&format_float(*v)),
            FieldValue::Integer(v) => {
                let _ = write!(out, "{v}i");
            }
            FieldValue::UInteger(v) => {
                let _ = write!(out, "{v}u");
            }
            FieldValue::Boolean(v) => out.push_str(if *v { "true" } else { "false" }),
            FieldValue::String(v) => {
                out.push('"');
                out.push_str(&escape_string_field(v));
                out.push('"');
            }
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UInteger(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<OffsetDateTime>,
}

impl Point {
    /// Start a point for `measurement` with no tags, fields or timestamp.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        }
    }

    /// Build a point from explicit tag and field collections.
    pub fn from_parts<T, K, V, F, N, X>(
        measurement: impl Into<String>,
        tags: T,
        fields: F,
        timestamp: OffsetDateTime,
    ) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        F: IntoIterator<Item = (N, X)>,
        N: Into<String>,
        X: Into<FieldValue>,
    {
        Self {
            measurement: measurement.into(),
            tags: tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            timestamp: Some(timestamp),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn time(&self) -> Option<OffsetDateTime> {
        self.timestamp
    }

    /// Stamp the point with `now` unless it already carries a timestamp.
    pub fn stamp_if_missing(&mut self, now: OffsetDateTime) {
        self.timestamp.get_or_insert(now);
    }

    /// Checks applied before any encoding: a non-empty measurement, at least
    /// one field, non-empty tags, no newlines in names and finite floats.
    pub fn validate(&self) -> Result<()> {
        if self.measurement.is_empty() {
            return Err(Error::InvalidPoint("empty measurement".to_string()));
        }
        if self.fields.is_empty() {
            return Err(Error::InvalidPoint(format!(
                "{} has no fields",
                self.measurement
            )));
        }
        for (key, value) in &self.tags {
            if key.is_empty() || value.is_empty() {
                return Err(Error::InvalidPoint(format!(
                    "empty tag {key:?}={value:?} on {}",
                    self.measurement
                )));
            }
        }
        let names = std::iter::once(&self.measurement)
            .chain(self.tags.keys())
            .chain(self.tags.values())
            .chain(self.fields.keys());
        for name in names {
            if name.contains('\n') {
                return Err(Error::InvalidPoint(format!("newline in {name:?}")));
            }
        }
        if self.fields.keys().any(|k| k.is_empty()) {
            return Err(Error::InvalidPoint("empty field key".to_string()));
        }
        for (key, value) in &self.fields {
            if let FieldValue::Float(v) = value {
                if !v.is_finite() {
                    return Err(Error::InvalidPoint(format!(
                        "non-finite float {key}={v} on {}",
                        self.measurement
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encode as a single line of line protocol.
    ///
    /// The timestamp suffix is only written when the point has one.
    pub fn to_line(&self, precision: Precision) -> Result<String> {
        self.validate()?;

        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        let mut first = true;
        for (key, value) in &self.fields {
            line.push(if first { ' ' } else { ',' });
            first = false;
            line.push_str(&escape_key(key));
            line.push('=');
            value.write_to(&mut line);
        }

        if let Some(ts) = self.timestamp {
            let _ = write!(line, " {}", precision.encode(ts));
        }
        Ok(line)
    }
}

/// Escape a measurement name (commas and spaces).
pub fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escape a tag key, tag value or field key (commas, equals signs and spaces).
pub fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

/// Escape the body of a string field value (quotes and backslashes).
pub fn escape_string_field(value: &str) -> String {
    escape(value, &['"', '\\'])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Shortest round-trip decimal form, always with a fractional part.
pub fn format_float(value: f64) -> String {
    let mut s = value.to_string();
    if !s.contains('.') && !s.contains("inf") && !s.contains("NaN") {
        s.push_str(".0");
    }
    s
}
