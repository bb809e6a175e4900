use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CheckLabels {
    pub outcome: CheckOutcome,
}

/// How a forward-auth check ended.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CheckOutcome {
    Admin,
    Cached,
    Refreshed,
    Granted,
    Denied,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the gate.
pub struct Metrics {
    pub checks_total: Family<CheckLabels, Counter>,
    pub fetches_total: Counter,
    pub fetch_failures_total: Counter,
    pub grants_total: Counter,
    pub grant_failures_total: Counter,
    pub snapshot_members: Gauge,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let checks_total = Family::<CheckLabels, Counter>::default();
        registry.register(
            "grist_gate_checks",
            "Forward-auth checks by outcome",
            checks_total.clone(),
        );

        let fetches_total = Counter::default();
        registry.register(
            "grist_gate_fetches",
            "Org access list fetches",
            fetches_total.clone(),
        );

        let fetch_failures_total = Counter::default();
        registry.register(
            "grist_gate_fetch_failures",
            "Org access list fetches that failed",
            fetch_failures_total.clone(),
        );

        let grants_total = Counter::default();
        registry.register(
            "grist_gate_grants",
            "Editor access grants issued",
            grants_total.clone(),
        );

        let grant_failures_total = Counter::default();
        registry.register(
            "grist_gate_grant_failures",
            "Editor access grants that failed",
            grant_failures_total.clone(),
        );

        let snapshot_members: Gauge = Gauge::default();
        registry.register(
            "grist_gate_snapshot_members",
            "Members in the cached org access snapshot",
            snapshot_members.clone(),
        );

        Self {
            checks_total,
            fetches_total,
            fetch_failures_total,
            grants_total,
            grant_failures_total,
            snapshot_members,
        }
    }

    pub fn record_check(&self, outcome: CheckOutcome) {
        self.checks_total
            .get_or_create(&CheckLabels { outcome })
            .inc();
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in `AppState`.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all gate metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in the OpenMetrics text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)
            .map_err(|e| anyhow::anyhow!("metrics encoding failed: {e}"))?;
        Ok(buf)
    }
}
