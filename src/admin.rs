//! Organization and bucket management.
//!
//! Used to wipe the configured bucket between test runs and by the
//! `reset-bucket` command.

use log::info;
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};

use crate::client::{failure, is_auth_failure, Client};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(rename = "orgID", default)]
    pub org_id: String,
}

#[derive(Debug, Deserialize)]
struct Organizations {
    #[serde(default)]
    orgs: Vec<Organization>,
}

#[derive(Debug, Deserialize)]
struct Buckets {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Debug, Serialize)]
struct NewBucket<'a> {
    #[serde(rename = "orgID")]
    org_id: &'a str,
    name: &'a str,
    #[serde(rename = "retentionRules")]
    retention_rules: Vec<serde_json::Value>,
}

pub struct AdminApi {
    client: Client,
}

impl AdminApi {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn find_organization(&self, name: &str) -> Result<Option<Organization>> {
        let resp = self
            .client
            .request(Method::GET, "api/v2/orgs")
            .query(&[("org", name)])
            .send()
            .await?;
        // Lookups by name answer 404 when nothing matches.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let orgs: Organizations = checked(resp).await?.json().await?;
        Ok(orgs.orgs.into_iter().find(|o| o.name == name))
    }

    /// Bucket called `name` in the client's organization.
    pub async fn find_bucket(&self, name: &str) -> Result<Option<Bucket>> {
        let resp = self
            .client
            .request(Method::GET, "api/v2/buckets")
            .query(&[("name", name), ("org", self.client.org())])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let buckets: Buckets = checked(resp).await?.json().await?;
        Ok(buckets.buckets.into_iter().find(|b| b.name == name))
    }

    pub async fn delete_bucket(&self, id: &str) -> Result<()> {
        let resp = self
            .client
            .request(Method::DELETE, &format!("api/v2/buckets/{id}"))
            .send()
            .await?;
        checked(resp).await?;
        Ok(())
    }

    pub async fn create_bucket(&self, org_id: &str, name: &str) -> Result<Bucket> {
        let resp = self
            .client
            .request(Method::POST, "api/v2/buckets")
            .json(&NewBucket {
                org_id,
                name,
                retention_rules: Vec::new(),
            })
            .send()
            .await?;
        Ok(checked(resp).await?.json().await?)
    }

    /// Drop the configured bucket if it exists and recreate it empty.
    pub async fn reset_bucket(&self) -> Result<Bucket> {
        let org_name = self.client.org();
        let bucket_name = self.client.bucket();

        if let Some(existing) = self.find_bucket(bucket_name).await? {
            info!("deleting bucket {} ({})", existing.name, existing.id);
            self.delete_bucket(&existing.id).await?;
        }

        let org = self
            .find_organization(org_name)
            .await?
            .ok_or_else(|| Error::Api {
                status: 404,
                message: format!("organization {org_name} not found"),
            })?;
        let bucket = self.create_bucket(&org.id, bucket_name).await?;
        info!("created bucket {} ({}) in {}", bucket.name, bucket.id, org.name);
        Ok(bucket)
    }
}

async fn checked(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let (status, message) = failure(resp).await;
    if is_auth_failure(status) {
        return Err(Error::Unauthorized(message));
    }
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}
