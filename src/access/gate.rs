//! The access gate: cache check, refresh, re-check, grant.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::grist::{Member, OrgAccessApi};
use crate::metrics::{CheckOutcome, MetricsRegistry};

use super::cache::{contains_email, MembershipSnapshot};

/// How [`AccessGate::ensure_access`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The configured admin; never looked up.
    Admin,
    /// Found in the cached snapshot without a remote call.
    Cached,
    /// Found after refreshing the snapshot.
    Refreshed,
    /// Missing after refresh; editor access was granted.
    Granted,
}

impl From<Outcome> for CheckOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Admin => CheckOutcome::Admin,
            Outcome::Cached => CheckOutcome::Cached,
            Outcome::Refreshed => CheckOutcome::Refreshed,
            Outcome::Granted => CheckOutcome::Granted,
        }
    }
}

/// Ensures users have editor access to one organisation.
pub struct AccessGate {
    api: Arc<dyn OrgAccessApi>,
    admin_email: String,
    snapshot: MembershipSnapshot,
    metrics: MetricsRegistry,
}

impl AccessGate {
    /// Build a gate and warm its snapshot with one fetch.
    ///
    /// A failed warm-up is logged and the gate starts with an empty
    /// snapshot; the first cache miss will fetch again.
    pub async fn new(
        api: Arc<dyn OrgAccessApi>,
        admin_email: impl Into<String>,
        metrics: MetricsRegistry,
    ) -> Self {
        let gate = Self {
            api,
            admin_email: admin_email.into(),
            snapshot: MembershipSnapshot::default(),
            metrics,
        };
        match gate.refresh().await {
            Ok(members) => info!(members = members.len(), "org access snapshot warmed"),
            Err(e) => warn!(error = %format!("{e:#}"), "initial org access fetch failed; starting empty"),
        }
        gate
    }

    /// Make sure `email` has access to the organisation.
    ///
    /// On `Ok`, the user either already had access or was just granted
    /// `editors`.  Any fetch or grant failure is returned unchanged; there
    /// is no retry and no grant without a successful fetch first.
    pub async fn ensure_access(&self, email: &str) -> Result<Outcome> {
        let outcome = self.reconcile(email).await;
        match &outcome {
            Ok(o) => self.metrics.metrics.record_check((*o).into()),
            Err(_) => self.metrics.metrics.record_check(CheckOutcome::Denied),
        }
        outcome
    }

    async fn reconcile(&self, email: &str) -> Result<Outcome> {
        if email == self.admin_email {
            return Ok(Outcome::Admin);
        }

        if self.snapshot.contains(email) {
            return Ok(Outcome::Cached);
        }

        debug!(%email, "not in snapshot; refreshing");
        let members = self
            .refresh()
            .await
            .with_context(|| format!("could not refresh org access while checking {email}"))?;
        if contains_email(&members, email) {
            return Ok(Outcome::Refreshed);
        }

        self.metrics.metrics.grants_total.inc();
        if let Err(e) = self.api.grant_editor(email).await {
            self.metrics.metrics.grant_failures_total.inc();
            return Err(e.context(format!("could not grant editor access to {email}")));
        }
        info!(%email, "granted editor access");
        Ok(Outcome::Granted)
    }

    /// Fetch the access list and replace the snapshot with it.
    ///
    /// The network call runs without the snapshot lock held; concurrent
    /// refreshes each replace the snapshot wholesale and the last one wins.
    pub async fn refresh(&self) -> Result<Arc<Vec<Member>>> {
        self.metrics.metrics.fetches_total.inc();
        let members = match self.api.fetch_access().await {
            Ok(m) => m,
            Err(e) => {
                self.metrics.metrics.fetch_failures_total.inc();
                return Err(e);
            }
        };
        let members = self.snapshot.replace(members);
        self.metrics
            .metrics
            .snapshot_members
            .set(i64::try_from(members.len()).unwrap_or(i64::MAX));
        Ok(members)
    }

    /// The access list as of the last successful refresh.
    pub fn snapshot(&self) -> Arc<Vec<Member>> {
        self.snapshot.current()
    }

    /// The remote API the gate fetches from and grants through.
    pub fn api(&self) -> &Arc<dyn OrgAccessApi> {
        &self.api
    }
}
