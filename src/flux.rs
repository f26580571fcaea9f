//! Flux query construction.
//!
//! Only the narrow shape this crate needs: one bucket, a time range, a
//! measurement filter, optional tag filters, an optional windowed mean and a
//! named yield.

use std::fmt::Write as _;
use std::time::Duration;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Error, Result};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_YIELD: &str = "mean";

#[derive(Debug, Clone, PartialEq)]
pub enum TimeRange {
    /// From `now - d` until now.
    Last(Duration),
    /// Absolute bounds, start inclusive, stop exclusive.
    Between(OffsetDateTime, OffsetDateTime),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FluxQuery {
    bucket: String,
    range: TimeRange,
    measurement: Option<String>,
    tags: Vec<(String, String)>,
    window_mean: Option<Duration>,
    yield_name: Option<String>,
}

impl FluxQuery {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            range: TimeRange::Last(DEFAULT_WINDOW),
            measurement: None,
            tags: Vec::new(),
            window_mean: None,
            yield_name: None,
        }
    }

    /// Everything written to `measurement` during the last hour, yielded as `mean`.
    pub fn recent(bucket: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self::new(bucket)
            .measurement(measurement)
            .yield_as(DEFAULT_YIELD)
    }

    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    pub fn last(self, window: Duration) -> Self {
        self.range(TimeRange::Last(window))
    }

    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = Some(measurement.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Aggregate values into `every`-sized windows using `mean`.
    pub fn window_mean(mut self, every: Duration) -> Self {
        self.window_mean = Some(every);
        self
    }

    pub fn yield_as(mut self, name: impl Into<String>) -> Self {
        self.yield_name = Some(name.into());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn render(&self) -> Result<String> {
        if self.bucket.is_empty() {
            return Err(Error::InvalidQuery("empty bucket".to_string()));
        }

        let mut flux = format!("from(bucket: {})", string_literal(&self.bucket));
        match &self.range {
            TimeRange::Last(window) => {
                if window.is_zero() {
                    return Err(Error::InvalidQuery("empty time window".to_string()));
                }
                let _ = write!(flux, "\n  |> range(start: -{})", duration_literal(*window));
            }
            TimeRange::Between(start, stop) => {
                if start >= stop {
                    return Err(Error::InvalidQuery(format!(
                        "range start {start} is not before stop {stop}"
                    )));
                }
                let _ = write!(
                    flux,
                    "\n  |> range(start: {}, stop: {})",
                    time_literal(*start)?,
                    time_literal(*stop)?
                );
            }
        }

        let mut predicates = Vec::new();
        if let Some(measurement) = &self.measurement {
            predicates.push(format!("r._measurement == {}", string_literal(measurement)));
        }
        for (key, value) in &self.tags {
            predicates.push(format!(
                "r[{}] == {}",
                string_literal(key),
                string_literal(value)
            ));
        }
        if !predicates.is_empty() {
            let _ = write!(
                flux,
                "\n  |> filter(fn: (r) => {})",
                predicates.join(" and ")
            );
        }

        if let Some(every) = self.window_mean {
            if every.is_zero() {
                return Err(Error::InvalidQuery("empty aggregate window".to_string()));
            }
            let _ = write!(
                flux,
                "\n  |> aggregateWindow(every: {}, fn: mean, createEmpty: false)",
                duration_literal(every)
            );
        }

        if let Some(name) = &self.yield_name {
            let _ = write!(flux, "\n  |> yield(name: {})", string_literal(name));
        }
        Ok(flux)
    }
}

/// Quoted Flux string literal.
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Flux duration literal using the coarsest exact unit.
pub fn duration_literal(duration: Duration) -> String {
    let secs = duration.as_secs();
    if duration.subsec_nanos() != 0 {
        if duration.subsec_nanos() % 1_000_000 == 0 {
            return format!("{}ms", duration.as_millis());
        }
        return format!("{}ns", duration.as_nanos());
    }
    match secs {
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

fn time_literal(time: OffsetDateTime) -> Result<String> {
    time.format(&Rfc3339)
        .map_err(|e| Error::InvalidQuery(format!("cannot format {time}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_recent_query() {
        let flux = FluxQuery::recent("test", "thermostat").render().unwrap();
        assert_eq!(
            flux,
            "from(bucket: \"test\")\n  |> range(start: -1h)\n  \
             |> filter(fn: (r) => r._measurement == \"thermostat\")\n  \
             |> yield(name: \"mean\")"
        );
    }

    #[test]
    fn test_window_mean_and_tags() {
        let flux = FluxQuery::new("test")
            .measurement("binance")
            .tag("symbol", "BTCUSDT")
            .last(Duration::from_secs(600))
            .window_mean(Duration::from_secs(60))
            .render()
            .unwrap();
        assert!(flux.contains("range(start: -10m)"));
        assert!(flux.contains(
            "filter(fn: (r) => r._measurement == \"binance\" and r[\"symbol\"] == \"BTCUSDT\")"
        ));
        assert!(flux.contains("aggregateWindow(every: 1m, fn: mean, createEmpty: false)"));
        assert!(!flux.contains("yield"));
    }

    #[test]
    fn test_between_range() {
        let flux = FluxQuery::new("test")
            .range(TimeRange::Between(
                datetime!(2023-03-23 16:00:00 UTC),
                datetime!(2023-03-23 17:00:00 UTC),
            ))
            .render()
            .unwrap();
        assert!(flux.contains("range(start: 2023-03-23T16:00:00Z, stop: 2023-03-23T17:00:00Z)"));
    }

    #[test]
    fn test_invalid_queries() {
        assert!(FluxQuery::new("").render().is_err());
        assert!(FluxQuery::new("b").last(Duration::ZERO).render().is_err());
        let at = datetime!(2023-03-23 16:00:00 UTC);
        assert!(FluxQuery::new("b")
            .range(TimeRange::Between(at, at))
            .render()
            .is_err());
    }

    #[test]
    fn test_literals() {
        assert_eq!(string_literal(r#"a"b\c${x}"#), r#""a\"b\\c\${x}""#);
        assert_eq!(duration_literal(Duration::from_secs(90)), "90s");
        assert_eq!(duration_literal(Duration::from_secs(172_800)), "2d");
        assert_eq!(duration_literal(Duration::from_millis(1500)), "1500ms");
        assert_eq!(duration_literal(Duration::from_nanos(10)), "10ns");
    }
}
