//! Client configuration.
//!
//! Endpoint and token are required; organization, bucket, timeout and the
//! read-side grouping mode have defaults and can be overridden either through
//! builder setters or the environment.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode::Grouping;
use crate::error::{Error, Result};

pub const ENV_URL: &str = "INFLUXDB_URL";
pub const ENV_TOKEN: &str = "INFLUXDB_TOKEN";
pub const ENV_ORG: &str = "INFLUXDB_ORG";
pub const ENV_BUCKET: &str = "INFLUXDB_BUCKET";
pub const ENV_TIMEOUT_SECS: &str = "INFLUXDB_TIMEOUT_SECS";
pub const ENV_GROUPING: &str = "INFLUXDB_GROUPING";

pub const DEFAULT_ORG: &str = "local";
pub const DEFAULT_BUCKET: &str = "test";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for one organization/bucket pair.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server endpoint, e.g. `http://localhost:8086`.
    pub url: String,

    /// API token sent as `Authorization: Token <token>`.
    pub token: String,

    /// Organization name.
    /// Default: "local"
    pub org: String,

    /// Bucket name.
    /// Default: "test"
    pub bucket: String,

    /// Request timeout, applied to the health probe as well.
    /// Default: 10 seconds
    pub timeout: Duration,

    /// How query rows are grouped back into records.
    /// Default: identity
    pub grouping: Grouping,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            org: DEFAULT_ORG.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout: DEFAULT_TIMEOUT,
            grouping: Grouping::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .field("grouping", &self.grouping)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Build a config from `INFLUXDB_*` variables.
    ///
    /// Fails with `MissingCredential` when the token or url is unset or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = present(ENV_TOKEN).ok_or(Error::MissingCredential(ENV_TOKEN))?;
        let url = present(ENV_URL).ok_or(Error::MissingCredential(ENV_URL))?;

        let mut config = Self::new(url, token);
        if let Some(org) = present(ENV_ORG) {
            config.org = org;
        }
        if let Some(bucket) = present(ENV_BUCKET) {
            config.bucket = bucket;
        }
        if let Some(raw) = present(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("{ENV_TIMEOUT_SECS} is not a number: {raw}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = present(ENV_GROUPING) {
            config.grouping = raw.parse()?;
        }
        Ok(config)
    }

    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = org.into();
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Reject empty credentials before anything touches the network.
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::MissingCredential(ENV_TOKEN));
        }
        if self.url.trim().is_empty() {
            return Err(Error::MissingCredential(ENV_URL));
        }
        Ok(())
    }
}
