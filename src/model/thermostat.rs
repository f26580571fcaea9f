use time::OffsetDateTime;

use crate::annotated::FluxRecord;
use crate::decode::Record;
use crate::error::Result;
use crate::point::{escape_key, format_float, Point, Precision};

pub const MEASUREMENT: &str = "thermostat";
const UNIT_TAG: (&str, &str) = ("unit", "temperature");

/// Average and maximum temperature reported for one user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThermostatSetting {
    pub user: String,
    pub avg: f64,
    pub max: f64,
}

/// The three ways a setting can be put on the wire. All of them land as the
/// same point; only the line form leaves the timestamp to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Hand-built line protocol text, no timestamp.
    LineProtocol,
    /// Point assembled from tag and field collections.
    Parameters,
    /// Point assembled by chained setters.
    Fluent,
}

impl ThermostatSetting {
    pub fn new(user: impl Into<String>, avg: f64, max: f64) -> Self {
        Self {
            user: user.into(),
            avg,
            max,
        }
    }

    /// Hand-built line without a timestamp. Runs the same checks as the
    /// point encodings, so a setting is accepted or rejected by all three alike.
    pub fn line_protocol(&self) -> Result<String> {
        self.to_point().validate()?;
        Ok(format!(
            "{MEASUREMENT},{}={},user={} avg={},max={}",
            UNIT_TAG.0,
            UNIT_TAG.1,
            escape_key(&self.user),
            format_float(self.avg),
            format_float(self.max)
        ))
    }

    pub fn parameters_point(&self, at: OffsetDateTime) -> Point {
        Point::from_parts(
            MEASUREMENT,
            [UNIT_TAG, ("user", self.user.as_str())],
            [("avg", self.avg), ("max", self.max)],
            at,
        )
    }

    pub fn fluent_point(&self, at: OffsetDateTime) -> Point {
        Point::new(MEASUREMENT)
            .tag(UNIT_TAG.0, UNIT_TAG.1)
            .tag("user", self.user.clone())
            .field("avg", self.avg)
            .field("max", self.max)
            .timestamp(at)
    }

    /// Wire line for `encoding`, stamped with `at` where the encoding carries time.
    pub fn encode(&self, encoding: Encoding, at: OffsetDateTime, precision: Precision) -> Result<String> {
        match encoding {
            Encoding::LineProtocol => self.line_protocol(),
            Encoding::Parameters => self.parameters_point(at).to_line(precision),
            Encoding::Fluent => self.fluent_point(at).to_line(precision),
        }
    }
}

impl Record for ThermostatSetting {
    const MEASUREMENT: &'static str = MEASUREMENT;
    const FIELDS: &'static [&'static str] = &["avg", "max"];

    fn to_point(&self) -> Point {
        Point::new(MEASUREMENT)
            .tag(UNIT_TAG.0, UNIT_TAG.1)
            .tag("user", self.user.clone())
            .field("avg", self.avg)
            .field("max", self.max)
    }

    fn seed(_time: OffsetDateTime, row: &FluxRecord) -> Self {
        let mut setting = Self::default();
        setting.assign_identity(row);
        setting
    }

    fn assign_identity(&mut self, row: &FluxRecord) {
        if let Some(user) = row.tag("user") {
            self.user = user.to_string();
        }
    }

    fn set_field(&mut self, field: &str, value: f64) -> bool {
        match field {
            "avg" => self.avg = value,
            "max" => self.max = value,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_encodings_agree() {
        let at = datetime!(2023-03-23 16:12:00 UTC);
        let setting = ThermostatSetting::new("foo", 35.5, 42.0);

        let line = setting
            .encode(Encoding::LineProtocol, at, Precision::Seconds)
            .unwrap();
        let params = setting
            .encode(Encoding::Parameters, at, Precision::Seconds)
            .unwrap();
        let fluent = setting
            .encode(Encoding::Fluent, at, Precision::Seconds)
            .unwrap();

        assert_eq!(line, "thermostat,unit=temperature,user=foo avg=35.5,max=42.0");
        assert_eq!(params, format!("{line} 1679587920"));
        assert_eq!(params, fluent);
    }

    #[test]
    fn test_record_point_matches_fluent_without_time() {
        let setting = ThermostatSetting::new("bar baz", 20.0, 21.5);
        assert_eq!(
            setting.to_point().to_line(Precision::Nanoseconds).unwrap(),
            setting.line_protocol().unwrap()
        );
        assert!(setting.line_protocol().unwrap().contains("user=bar\\ baz"));
    }

    #[test]
    fn test_encodings_reject_the_same_settings() {
        let at = datetime!(2023-03-23 16:12:00 UTC);
        let bad = [
            ThermostatSetting::new("a\nb", 1.0, 2.0),
            ThermostatSetting::new("", 1.0, 2.0),
            ThermostatSetting::new("foo", f64::NAN, 2.0),
            ThermostatSetting::new("foo", 1.0, f64::INFINITY),
        ];
        for setting in &bad {
            for encoding in [Encoding::LineProtocol, Encoding::Parameters, Encoding::Fluent] {
                let err = setting
                    .encode(encoding, at, Precision::Nanoseconds)
                    .unwrap_err();
                assert!(
                    matches!(err, crate::error::Error::InvalidPoint(_)),
                    "{encoding:?} accepted {setting:?}"
                );
            }
        }
    }

    #[test]
    fn test_line_form_stays_on_one_line() {
        let setting = ThermostatSetting::new("foo", 35.5, 42.0);
        assert!(!setting.line_protocol().unwrap().contains('\n'));
        assert!(ThermostatSetting::new("x\ny", 1.0, 1.0).line_protocol().is_err());
    }

    #[test]
    fn test_set_field() {
        let mut setting = ThermostatSetting::default();
        assert!(setting.set_field("avg", 1.0));
        assert!(setting.set_field("max", 2.0));
        assert!(!setting.set_field("min", 3.0));
        assert_eq!(setting, ThermostatSetting::new("", 1.0, 2.0));
    }
}
