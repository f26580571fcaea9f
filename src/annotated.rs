//! Annotated CSV decoding.
//!
//! Query responses arrive as annotated CSV: each table is preceded by
//! `#datatype`, `#group` and `#default` rows, then a header row whose first
//! column is reserved for annotations. A response may hold several tables with
//! different schemas, and a failing query reports itself as a final table with
//! `error,reference` columns.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, StringRecord};
use log::{debug, warn};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Double,
    Long,
    UnsignedLong,
    Boolean,
    DateTime,
    Duration,
    Base64Binary,
    /// No `#datatype` annotation; inferred from the column name.
    Unknown,
}

impl DataType {
    pub fn from_annotation(raw: &str) -> Self {
        match raw {
            "string" => DataType::String,
            "double" => DataType::Double,
            "long" => DataType::Long,
            "unsignedLong" => DataType::UnsignedLong,
            "boolean" => DataType::Boolean,
            "dateTime:RFC3339" | "dateTime:RFC3339Nano" => DataType::DateTime,
            "duration" => DataType::Duration,
            "base64Binary" => DataType::Base64Binary,
            _ => DataType::Unknown,
        }
    }
}

/// One decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Double(f64),
    Long(i64),
    UnsignedLong(u64),
    Bool(bool),
    Time(OffsetDateTime),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Long(v) => Some(*v as f64),
            Value::UnsignedLong(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<OffsetDateTime> {
        match self {
            Value::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One data row of a query response, keyed by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FluxRecord {
    values: BTreeMap<String, Value>,
}

impl FluxRecord {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn table(&self) -> Option<i64> {
        match self.get("table") {
            Some(Value::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn time(&self) -> Option<OffsetDateTime> {
        self.get("_time").and_then(Value::as_time)
    }

    pub fn measurement(&self) -> Option<&str> {
        self.tag("_measurement")
    }

    pub fn field(&self) -> Option<&str> {
        self.tag("_field")
    }

    pub fn value(&self) -> Option<&Value> {
        self.get("_value")
    }

    /// String-valued column, typically a tag.
    pub fn tag(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Tag columns in name order: string columns other than `result`,
    /// `table` and the `_`-prefixed system columns.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().filter_map(|(column, value)| {
            if column.starts_with('_') || column == "result" || column == "table" {
                return None;
            }
            value.as_str().map(|v| (column.as_str(), v))
        })
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FluxRecord {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct TableSchema {
    datatypes: Vec<DataType>,
    defaults: Vec<String>,
    header: Option<Vec<String>>,
}

impl TableSchema {
    fn is_error_table(&self) -> bool {
        self.header
            .as_ref()
            .map(|h| h.iter().any(|c| c == "error") && h.iter().any(|c| c == "reference"))
            .unwrap_or(false)
    }

    fn datatype(&self, idx: usize, column: &str) -> DataType {
        match self.datatypes.get(idx) {
            Some(DataType::Unknown) | None => infer_datatype(column),
            Some(dt) => *dt,
        }
    }
}

fn infer_datatype(column: &str) -> DataType {
    match column {
        "_time" | "_start" | "_stop" => DataType::DateTime,
        "table" => DataType::Long,
        _ => DataType::Unknown,
    }
}

fn is_header_row(record: &StringRecord) -> bool {
    record.get(1) == Some("result") && record.get(2) == Some("table")
}

/// Decode a full annotated CSV response into rows.
///
/// Cells that do not parse as their declared type become [`Value::Null`] and
/// are logged; an error table in the stream fails the whole call.
pub fn parse(body: &str) -> Result<Vec<FluxRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    let mut schema = TableSchema::default();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let Some(first) = record.get(0) else {
            continue;
        };

        if first.starts_with('#') {
            if schema.header.is_some() {
                schema = TableSchema::default();
            }
            match first {
                "#datatype" => {
                    schema.datatypes = record.iter().map(DataType::from_annotation).collect();
                }
                "#default" => {
                    schema.defaults = record.iter().map(str::to_string).collect();
                }
                "#group" => {}
                other => debug!("ignoring annotation {other}"),
            }
            continue;
        }

        if schema.header.is_none() || (schema.datatypes.is_empty() && is_header_row(&record)) {
            schema.header = Some(record.iter().map(str::to_string).collect());
            continue;
        }

        if schema.is_error_table() {
            return Err(error_from_row(&schema, &record));
        }

        rows.push(decode_row(&schema, &record));
    }

    Ok(rows)
}

fn decode_row(schema: &TableSchema, record: &StringRecord) -> FluxRecord {
    let mut row = FluxRecord::default();
    let Some(header) = schema.header.as_ref() else {
        return row;
    };

    for (idx, column) in header.iter().enumerate() {
        if column.is_empty() {
            continue;
        }
        let mut raw = record.get(idx).unwrap_or("");
        if raw.is_empty() {
            raw = schema.defaults.get(idx).map(String::as_str).unwrap_or("");
        }
        let value = parse_cell(schema.datatype(idx, column), column, raw);
        row.insert(column.clone(), value);
    }
    row
}

fn parse_cell(datatype: DataType, column: &str, raw: &str) -> Value {
    if raw.is_empty() {
        return match datatype {
            DataType::String | DataType::Unknown => Value::String(String::new()),
            _ => Value::Null,
        };
    }

    let parsed = match datatype {
        DataType::String | DataType::Duration | DataType::Base64Binary => {
            Some(Value::String(raw.to_string()))
        }
        DataType::Double => raw.parse().ok().map(Value::Double),
        DataType::Long => raw.parse().ok().map(Value::Long),
        DataType::UnsignedLong => raw.parse().ok().map(Value::UnsignedLong),
        DataType::Boolean => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        DataType::DateTime => OffsetDateTime::parse(raw, &Rfc3339).ok().map(Value::Time),
        DataType::Unknown => {
            if column == "_value" {
                Some(
                    raw.parse()
                        .map(Value::Double)
                        .unwrap_or_else(|_| Value::String(raw.to_string())),
                )
            } else {
                Some(Value::String(raw.to_string()))
            }
        }
    };

    parsed.unwrap_or_else(|| {
        warn!("column {column}: cannot decode {raw:?} as {datatype:?}");
        Value::Null
    })
}

fn error_from_row(schema: &TableSchema, record: &StringRecord) -> Error {
    let column = |name: &str| {
        schema
            .header
            .as_ref()
            .and_then(|h| h.iter().position(|c| c == name))
            .and_then(|idx| record.get(idx))
            .unwrap_or("")
    };
    let message = column("error");
    let reference = column("reference");
    let message = if reference.is_empty() {
        message.to_string()
    } else {
        format!("{message} (reference {reference})")
    };
    Error::Query {
        status: 200,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const THERMOSTAT: &str = "\
#group,false,false,true,true,false,false,true,true,true,true
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string,string
#default,mean,,,,,,,,,
,result,table,_start,_stop,_time,_value,_field,_measurement,unit,user
,,0,2023-03-23T15:12:00Z,2023-03-23T16:12:00Z,2023-03-23T16:10:00.5Z,35.5,avg,thermostat,temperature,foo
,,1,2023-03-23T15:12:00Z,2023-03-23T16:12:00Z,2023-03-23T16:10:00.5Z,42,max,thermostat,temperature,foo

";

    #[test]
    fn test_parse_annotated_tables() {
        let rows = parse(THERMOSTAT).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.get("result"), Some(&Value::String("mean".to_string())));
        assert_eq!(first.table(), Some(0));
        assert_eq!(first.time(), Some(datetime!(2023-03-23 16:10:00.5 UTC)));
        assert_eq!(first.field(), Some("avg"));
        assert_eq!(first.measurement(), Some("thermostat"));
        assert_eq!(first.tag("user"), Some("foo"));
        assert_eq!(first.value().and_then(Value::as_f64), Some(35.5));

        assert_eq!(rows[1].field(), Some("max"));
        assert_eq!(rows[1].value().and_then(Value::as_f64), Some(42.0));
    }

    #[test]
    fn test_schema_change_between_tables() {
        let body = "\
#datatype,string,long,dateTime:RFC3339,double,string
#group,false,false,false,false,true
#default,_result,,,,
,result,table,_time,_value,_field
,,0,2023-03-23T16:10:00Z,1.5,avg

#datatype,string,long,dateTime:RFC3339,long,string,string
#group,false,false,false,false,true,true
#default,_result,,,,,
,result,table,_time,_value,_field,symbol
,,1,2023-03-23T16:11:00Z,7,count,BTCUSDT
";
        let rows = parse(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value(), Some(&Value::Double(1.5)));
        assert_eq!(rows[0].tag("symbol"), None);
        assert_eq!(rows[1].value(), Some(&Value::Long(7)));
        assert_eq!(rows[1].tag("symbol"), Some("BTCUSDT"));
    }

    #[test]
    fn test_error_table_fails_query() {
        let body = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,\"failed to initialize execute state: could not find bucket \"\"nope\"\"\",897
";
        let err = parse(body).unwrap_err();
        match err {
            Error::Query { message, .. } => {
                assert!(message.contains("could not find bucket"));
                assert!(message.contains("897"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_cell_becomes_null() {
        let body = "\
#datatype,string,long,dateTime:RFC3339,double,string
#group,false,false,false,false,true
#default,_result,,,,
,result,table,_time,_value,_field
,,0,2023-03-23T16:10:00Z,not-a-number,avg
";
        let rows = parse(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].value().unwrap().is_null());
        assert_eq!(rows[0].field(), Some("avg"));
    }

    #[test]
    fn test_unannotated_csv_infers_types() {
        let body = "\
,result,table,_time,_value,_field,user
,_result,0,2023-03-23T16:10:00Z,35.5,avg,foo

,result,table,_time,_value,_field,user
,_result,1,2023-03-23T16:10:00Z,42,max,foo
";
        let rows = parse(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time(), Some(datetime!(2023-03-23 16:10:00 UTC)));
        assert_eq!(rows[1].value(), Some(&Value::Double(42.0)));
        assert_eq!(rows[1].table(), Some(1));
    }

    #[test]
    fn test_empty_body() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\r\n").unwrap().is_empty());
    }
}
