//! Synthetic market candles.

use std::time::Duration;

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::model::BinanceAsset;

const BASE_PRICE: f64 = 27469.09;

/// `count` candles for `symbol`, oldest first, spaced `step` apart and ending
/// one `step` before `end`.
///
/// Candle `i` is stamped `end - (count - i) * step`. Prices follow a
/// deterministic walk, so repeated calls with the same arguments agree.
/// Fails with `Config` when the earliest candle falls outside the
/// representable date range.
pub fn synthetic_candles(
    symbol: &str,
    count: usize,
    end: OffsetDateTime,
    step: Duration,
) -> Result<Vec<BinanceAsset>> {
    let out_of_range = || {
        Error::Config(format!(
            "{count} candles of {step:?} before {end} are out of range"
        ))
    };
    let step = time::Duration::try_from(step).map_err(|_| out_of_range())?;
    let steps = i32::try_from(count).map_err(|_| out_of_range())?;
    step
        .checked_mul(steps)
        .and_then(|span| end.checked_sub(span))
        .ok_or_else(out_of_range)?;

    let mut candles = Vec::with_capacity(count.min(4096));
    let mut open = BASE_PRICE;

    for i in 0..steps {
        let time = step
            .checked_mul(steps - i)
            .and_then(|offset| end.checked_sub(offset))
            .ok_or_else(out_of_range)?;

        let swing = ((i * 7) % 11) as f64 - 5.0;
        let close = round_cents(open + swing * 2.17);
        let high = round_cents(open.max(close) + 1.0 + (i % 3) as f64 * 1.41);
        let low = round_cents(open.min(close) - 0.01 - (i % 4) as f64 * 0.93);

        candles.push(BinanceAsset {
            time,
            symbol: symbol.to_string(),
            open,
            close,
            high,
            low,
        });
        open = close;
    }
    Ok(candles)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
