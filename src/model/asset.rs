use std::fmt;

use time::macros::format_description;
use time::OffsetDateTime;

use crate::annotated::FluxRecord;
use crate::decode::Record;
use crate::point::Point;

pub const MEASUREMENT: &str = "binance";

/// One OHLC candle for a trading pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BinanceAsset {
    pub time: OffsetDateTime,
    pub symbol: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

impl BinanceAsset {
    pub fn new(time: OffsetDateTime, symbol: impl Into<String>) -> Self {
        Self {
            time,
            symbol: symbol.into(),
            open: 0.0,
            close: 0.0,
            high: 0.0,
            low: 0.0,
        }
    }
}

impl fmt::Display for BinanceAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stamp = self
            .time
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .map_err(|_| fmt::Error)?;
        write!(
            f,
            "Time: {stamp}, Symbol: {}, Open: {:.6}, Close: {:.6}, High: {:.6}, Low: {:.6}",
            self.symbol, self.open, self.close, self.high, self.low
        )
    }
}

impl Record for BinanceAsset {
    const MEASUREMENT: &'static str = MEASUREMENT;
    const FIELDS: &'static [&'static str] = &["open", "close", "high", "low"];

    fn to_point(&self) -> Point {
        Point::new(MEASUREMENT)
            .tag("symbol", self.symbol.clone())
            .field("open", self.open)
            .field("close", self.close)
            .field("high", self.high)
            .field("low", self.low)
            .timestamp(self.time)
    }

    fn seed(time: OffsetDateTime, row: &FluxRecord) -> Self {
        let mut asset = Self::new(time, "");
        asset.assign_identity(row);
        asset
    }

    fn assign_identity(&mut self, row: &FluxRecord) {
        if let Some(symbol) = row.tag("symbol") {
            self.symbol = symbol.to_string();
        }
    }

    fn set_field(&mut self, field: &str, value: f64) -> bool {
        match field {
            "open" => self.open = value,
            "close" => self.close = value,
            "high" => self.high = value,
            "low" => self.low = value,
            _ => return false,
        }
        true
    }
}
