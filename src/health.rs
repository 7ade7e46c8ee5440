//! Health probe registry: on-demand liveness checks for each tier.
//!
//! No direct grounding-crate equivalent (its stats are counters, not
//! probes); modeled after the collaborator interface the core spec
//! names directly (`check() -> {status, latency, details}`), in the
//! grounding crate's style of a small trait plus a `Vec<Arc<dyn _>>`
//! registry (mirrors [`crate::hooks::HookRegistry`]).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use crate::status::Slot;
use crate::traits::{LocalStore, RemoteStore};

/// Outcome of a single probe check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of running one probe.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub probe_name: &'static str,
    pub status: HealthStatus,
    pub latency: Duration,
    pub details: String,
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthReport;
    fn name(&self) -> &'static str;
}

/// Probes the remote tier with a round-trip `ping`.
pub struct RemoteProbe {
    remote: Arc<dyn RemoteStore>,
}

impl RemoteProbe {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl HealthProbe for RemoteProbe {
    async fn check(&self) -> HealthReport {
        match self.remote.ping().await {
            Ok(latency) => HealthReport {
                probe_name: "remote",
                status: HealthStatus::Healthy,
                latency,
                details: format!("{} responded to ping", self.remote.name()),
            },
            Err(err) => HealthReport {
                probe_name: "remote",
                status: HealthStatus::Unhealthy,
                latency: Duration::ZERO,
                details: err.to_string(),
            },
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Probes the local tier with a write-read-delete self-test, since a
/// bounded in-process map has no round-trip of its own to measure.
pub struct LocalProbe {
    local: Arc<dyn LocalStore>,
    probe_key: String,
}

impl LocalProbe {
    #[must_use]
    pub fn new(local: Arc<dyn LocalStore>, namespace: &str) -> Self {
        Self {
            local,
            probe_key: format!("{namespace}:__health_probe__"),
        }
    }
}

#[async_trait]
impl HealthProbe for LocalProbe {
    async fn check(&self) -> HealthReport {
        let start = Instant::now();
        self.local
            .set(&self.probe_key, Slot::Value(b"ok".to_vec()), Duration::from_secs(5))
            .await;
        let read_back = self.local.try_get(&self.probe_key).await;
        self.local.remove(&self.probe_key).await;
        let latency = start.elapsed();

        match read_back {
            Some(Slot::Value(v)) if v == b"ok" => HealthReport {
                probe_name: "local",
                status: HealthStatus::Healthy,
                latency,
                details: format!("{} write-read-delete self-test passed", self.local.name()),
            },
            other => HealthReport {
                probe_name: "local",
                status: HealthStatus::Unhealthy,
                latency,
                details: format!("self-test returned unexpected slot: {other:?}"),
            },
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Runs every registered probe and collects their reports.
#[derive(Default)]
pub struct HealthRegistry {
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl HealthRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    pub async fn check_all(&self) -> Vec<HealthReport> {
        let mut reports = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let report = probe.check().await;
            if report.status != HealthStatus::Healthy {
                warn!(probe = probe.name(), status = ?report.status, "health probe did not report healthy");
            }
            reports.push(report);
        }
        reports
    }
}
