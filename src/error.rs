use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} must be set")]
    MissingCredential(&'static str),
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("influxdb unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("influxdb unhealthy: {0}")]
    Unhealthy(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("write rejected (status {status}): {message}")]
    Write { status: u16, message: String },
    #[error("query failed (status {status}): {message}")]
    Query { status: u16, message: String },
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid point: {0}")]
    InvalidPoint(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors raised before any request left the process.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::MissingCredential(_)
                | Error::Config(_)
                | Error::InvalidUrl { .. }
                | Error::InvalidPoint(_)
                | Error::InvalidQuery(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
