//! Read path.
//!
//! Queries are submitted as Flux and answered in annotated CSV. Callers can
//! take the body as text, as typed rows, or folded into domain records.

use std::collections::BTreeMap;

use log::debug;
use reqwest::Method;
use serde::Serialize;

use crate::annotated::{self, FluxRecord};
use crate::client::{failure, is_auth_failure, Client};
use crate::decode::{merge_rows, Grouping, Record, RecordKey};
use crate::error::{Error, Result};
use crate::flux::FluxQuery;

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: Dialect,
}

#[derive(Debug, Serialize)]
struct Dialect {
    header: bool,
    annotations: [&'static str; 3],
    #[serde(rename = "commentPrefix")]
    comment_prefix: &'static str,
    #[serde(rename = "dateTimeFormat")]
    date_time_format: &'static str,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            header: true,
            annotations: ["datatype", "group", "default"],
            comment_prefix: "#",
            date_time_format: "RFC3339Nano",
        }
    }
}

#[derive(Clone)]
pub struct QueryApi {
    client: Client,
    grouping: Grouping,
}

impl QueryApi {
    pub(crate) fn new(client: Client) -> Self {
        let grouping = client.config().grouping;
        Self { client, grouping }
    }

    /// Override the grouping mode taken from the client config.
    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    /// Run `query` and return the response body untouched.
    pub async fn query_raw(&self, query: &FluxQuery) -> Result<String> {
        let flux = query.render()?;
        self.submit(&flux).await
    }

    /// Raw text of the last hour of `measurement` in the client's bucket.
    pub async fn recent_raw(&self, measurement: &str) -> Result<String> {
        self.query_raw(&FluxQuery::recent(self.client.bucket(), measurement))
            .await
    }

    /// Run `query` and decode the annotated CSV into rows.
    pub async fn query_rows(&self, query: &FluxQuery) -> Result<Vec<FluxRecord>> {
        let body = self.query_raw(query).await?;
        annotated::parse(&body)
    }

    /// Run `query` and fold its rows into `R` records.
    pub async fn query_structured<R: Record>(
        &self,
        query: &FluxQuery,
    ) -> Result<BTreeMap<RecordKey, R>> {
        let rows = self.query_rows(query).await?;
        debug!("decoding {} row(s) into {}", rows.len(), R::MEASUREMENT);
        Ok(merge_rows(rows, self.grouping))
    }

    /// Records of type `R` written during the last hour.
    pub async fn recent<R: Record>(&self) -> Result<BTreeMap<RecordKey, R>> {
        self.query_structured(&FluxQuery::recent(self.client.bucket(), R::MEASUREMENT))
            .await
    }

    async fn submit(&self, flux: &str) -> Result<String> {
        debug!("flux query:\n{flux}");
        let body = QueryBody {
            query: flux,
            kind: "flux",
            dialect: Dialect::default(),
        };
        let resp = self
            .client
            .request(Method::POST, "api/v2/query")
            .query(&[("org", self.client.org())])
            .header(reqwest::header::ACCEPT, "application/csv")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let (status, message) = failure(resp).await;
            if is_auth_failure(status) {
                return Err(Error::Unauthorized(message));
            }
            return Err(Error::Query {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.text().await?)
    }
}
