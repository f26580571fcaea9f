//! Write path.
//!
//! [`WriteApi`] buffers line protocol in memory and submits the whole buffer
//! on [`WriteApi::flush`]. Nothing is sent before a flush and nothing is
//! retried; a failed flush keeps the buffer so the caller can decide.

use log::debug;
use reqwest::Method;
use time::OffsetDateTime;

use crate::client::{failure, is_auth_failure, Client};
use crate::decode::Record;
use crate::error::{Error, Result};
use crate::model::{Encoding, ThermostatSetting};
use crate::point::{Point, Precision};

pub struct WriteApi {
    client: Client,
    precision: Precision,
    buffer: Vec<String>,
}

impl WriteApi {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            precision: Precision::default(),
            buffer: Vec::new(),
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Lines waiting for the next flush.
    pub fn pending(&self) -> &[String] {
        &self.buffer
    }

    /// Queue one line of line protocol exactly as given.
    pub fn write_record(&mut self, line: impl Into<String>) {
        let line = line.into();
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.is_empty() {
            self.buffer.push(line.to_string());
        }
    }

    /// Queue a point, stamping it with the current time if it has none.
    pub fn write_point(&mut self, point: &Point) -> Result<()> {
        let mut point = point.clone();
        point.stamp_if_missing(OffsetDateTime::now_utc());
        let line = point.to_line(self.precision)?;
        self.buffer.push(line);
        Ok(())
    }

    pub fn write<R: Record>(&mut self, record: &R) -> Result<()> {
        self.write_point(&record.to_point())
    }

    /// Submit everything buffered. An empty buffer sends nothing.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let body = self.buffer.join("\n");
        let config = self.client.config();
        debug!(
            "flushing {} line(s) to {}/{}",
            self.buffer.len(),
            config.org,
            config.bucket
        );

        let resp = self
            .client
            .request(Method::POST, "api/v2/write")
            .query(&[
                ("org", config.org.as_str()),
                ("bucket", config.bucket.as_str()),
                ("precision", self.precision.as_str()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        if resp.status().is_success() {
            self.buffer.clear();
            return Ok(());
        }
        let (status, message) = failure(resp).await;
        if is_auth_failure(status) {
            return Err(Error::Unauthorized(message));
        }
        Err(Error::Write {
            status: status.as_u16(),
            message,
        })
    }
}

/// Write one thermostat setting using `encoding`, then flush.
pub async fn write_thermostat(
    api: &mut WriteApi,
    setting: &ThermostatSetting,
    encoding: Encoding,
) -> Result<()> {
    let line = setting.encode(encoding, OffsetDateTime::now_utc(), api.precision())?;
    api.write_record(line);
    api.flush().await
}
