//! Typed InfluxDB 2.x client for thermostat readings and market candles.
//!
//! Records go out as line protocol and come back as annotated CSV, one row per
//! field. [`decode::merge_rows`] folds those rows back into records, grouped
//! either by timestamp alone or by timestamp plus identity tags.
//!
//! ```ignore
//! use tickflux::{Client, ClientConfig, ThermostatSetting};
//!
//! let client = Client::connect(ClientConfig::from_env()?).await?;
//! let mut writer = client.write_api();
//! writer.write(&ThermostatSetting::new("foo", 35.5, 42.0))?;
//! writer.flush().await?;
//!
//! let settings = client.query_api().recent::<ThermostatSetting>().await?;
//! ```

pub mod admin;
pub mod annotated;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod flux;
pub mod market;
pub mod model;
pub mod point;
pub mod query;
pub mod write;

pub use annotated::{FluxRecord, Value};
pub use client::{Client, Health};
pub use config::ClientConfig;
pub use decode::{Grouping, Record, RecordKey};
pub use error::{Error, Result};
pub use flux::{FluxQuery, TimeRange};
pub use model::{BinanceAsset, Encoding, ThermostatSetting};
pub use point::{FieldValue, Point, Precision};
pub use query::QueryApi;
pub use write::{write_thermostat, WriteApi};
