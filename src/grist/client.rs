//! reqwest implementation of [`OrgAccessApi`] against a Grist server.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, warn};

use crate::config::GristConfig;

use super::{AccessDelta, Member, OrgAccess, OrgAccessApi};

pub struct GristClient {
    http_client: reqwest::Client,
    access_url: String,
    status_url: String,
    api_key: String,
    strict_grant: bool,
}

impl GristClient {
    pub fn new(config: &GristConfig, api_key: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("grist-gate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        let root = format!("{}:{}", config.base_url.trim_end_matches('/'), config.port);
        Ok(Self {
            http_client,
            access_url: format!("{root}/api/orgs/{}/access", config.org),
            status_url: format!("{root}/status"),
            api_key,
            strict_grant: config.strict_grant,
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

#[async_trait::async_trait]
impl OrgAccessApi for GristClient {
    async fn fetch_access(&self) -> Result<Vec<Member>> {
        let resp = self
            .http_client
            .get(&self.access_url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await
            .context("org access request failed")?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            bail!("org access request returned unexpected status code: {status}");
        }

        let body: OrgAccess = resp
            .json()
            .await
            .context("failed to decode org access response")?;

        debug!(members = body.users.len(), "fetched org access list");
        Ok(body.users)
    }

    async fn grant_editor(&self, email: &str) -> Result<()> {
        let resp = self
            .http_client
            .patch(&self.access_url)
            .header(ACCEPT, "*/*")
            .header(AUTHORIZATION, self.bearer())
            .json(&AccessDelta::editor(email))
            .send()
            .await
            .context("org access grant request failed")?;

        let status = resp.status();
        if !status.is_success() {
            // The grant is unverified unless strict mode is on: a completed
            // round trip counts as success.
            if self.strict_grant {
                bail!("org access grant for {email} returned status {status}");
            }
            warn!(%email, %status, "org access grant returned non-success status");
        }
        Ok(())
    }

    async fn check_health(&self) -> Result<()> {
        let resp = self
            .http_client
            .get(&self.status_url)
            .send()
            .await
            .context("status request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned {status}", self.status_url);
        }
        Ok(())
    }
}
