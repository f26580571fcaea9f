//! Connection handle.
//!
//! [`Client::connect`] validates credentials, builds the HTTP client and probes
//! `/health` before handing out a handle. The handle is cheap to clone and is
//! the entry point for the write, query and admin APIs.

use std::sync::Arc;

use log::{debug, info};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::admin::AdminApi;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::query::QueryApi;
use crate::write::WriteApi;

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Health {
    pub fn is_pass(&self) -> bool {
        self.status == "pass"
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

struct Inner {
    http: reqwest::Client,
    base: Url,
    config: ClientConfig,
}

/// Handle bound to one organization and bucket.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base", &self.inner.base.as_str())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Client {
    /// Validate `config`, then probe the server's health endpoint.
    ///
    /// Empty credentials fail with `MissingCredential` before any request.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let health = client.health().await?;
        if !health.is_pass() {
            return Err(Error::Unhealthy(format!(
                "status {}: {}",
                health.status,
                health.message.unwrap_or_default()
            )));
        }
        info!(
            "connected to {} ({} {}), org={} bucket={}",
            client.inner.base,
            health.name,
            health.version.as_deref().unwrap_or("unknown version"),
            client.inner.config.org,
            client.inner.config.bucket
        );
        Ok(client)
    }

    /// Build a handle without probing the server.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(config.url.trim()).map_err(|source| Error::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                url: config.url.clone(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(http_setup_failure)?;
        Ok(Self {
            inner: Arc::new(Inner { http, base, config }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn org(&self) -> &str {
        &self.inner.config.org
    }

    pub fn bucket(&self) -> &str {
        &self.inner.config.bucket
    }

    /// Probe `GET /health`.
    ///
    /// Transport failures and timeouts surface as `Unreachable`; a reachable
    /// but failing server as `Unhealthy`.
    pub async fn health(&self) -> Result<Health> {
        let resp = self
            .inner
            .http
            .get(self.endpoint("health"))
            .send()
            .await
            .map_err(Error::Unreachable)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Unreachable)?;
        match serde_json::from_str::<Health>(&body) {
            Ok(health) if status.is_success() => Ok(health),
            Ok(health) => Err(Error::Unhealthy(format!(
                "status {}: {}",
                health.status,
                health.message.unwrap_or_else(|| status.to_string())
            ))),
            Err(_) => Err(Error::Unhealthy(format!(
                "unexpected health response ({status}): {}",
                body.trim()
            ))),
        }
    }

    pub fn write_api(&self) -> WriteApi {
        WriteApi::new(self.clone())
    }

    pub fn query_api(&self) -> QueryApi {
        QueryApi::new(self.clone())
    }

    pub fn admin_api(&self) -> AdminApi {
        AdminApi::new(self.clone())
    }

    pub(crate) fn endpoint(&self, path: &str) -> Url {
        let mut url = self.inner.base.clone();
        let joined = format!(
            "{}/{}",
            self.inner.base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);
        url
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint(path);
        debug!("{method} {url}");
        self.inner
            .http
            .request(method, url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.inner.config.token),
            )
    }
}

/// Status code and best-effort message of a failed response.
pub(crate) async fn failure(resp: Response) -> (StatusCode, String) {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(ApiErrorBody {
            message: Some(message),
            ..
        }) => message,
        Ok(ApiErrorBody {
            code: Some(code), ..
        }) => code,
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    (status, message)
}

/// The HTTP stack could not be set up locally; no request was attempted.
fn http_setup_failure(err: reqwest::Error) -> Error {
    Error::Config(format!("cannot build http client: {err}"))
}

pub(crate) fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
