//! Domain records stored by this crate.

mod asset;
mod thermostat;

pub use asset::BinanceAsset;
pub use thermostat::{Encoding, ThermostatSetting};
