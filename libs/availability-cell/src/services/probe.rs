use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;

use crate::models::{Availability, BackendStatus};

/// Reachability check for the remote API. Concurrent callers share one
/// in-flight probe: the state lock is held across the health request, so
/// everyone queued behind it reads the freshly decided verdict.
pub struct AvailabilityProbe {
    client: Client,
    health_url: String,
    recheck_after: Option<chrono::Duration>,
    state: Mutex<Availability>,
    probes_sent: AtomicU64,
}

impl AvailabilityProbe {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.probe_timeout()).build()?;
        let recheck_after = config
            .probe_recheck()
            .and_then(|window| chrono::Duration::from_std(window).ok());

        Ok(Self {
            client,
            health_url: config.health_url(),
            recheck_after,
            state: Mutex::new(Availability::Unknown),
            probes_sent: AtomicU64::new(0),
        })
    }

    /// Whether remote calls should be attempted.
    #[instrument(skip(self))]
    pub async fn check(&self) -> bool {
        let mut state = self.state.lock().await;

        if let Some(available) = state.verdict(self.recheck_after, Utc::now()) {
            return available;
        }

        let available = self.probe().await;
        *state = Availability::decided(available, Utc::now());
        available
    }

    async fn probe(&self) -> bool {
        self.probes_sent.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        match self.client.get(&self.health_url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(
                    "Backend reachable at {} ({}ms)",
                    self.health_url,
                    start.elapsed().as_millis()
                );
                true
            }
            Ok(response) => {
                warn!("Backend health returned {}, using local storage", response.status());
                false
            }
            Err(e) if e.is_timeout() => {
                warn!("Backend health timed out after {}ms, using local storage", start.elapsed().as_millis());
                false
            }
            Err(e) => {
                warn!("Backend unreachable ({}), using local storage", e);
                false
            }
        }
    }

    /// Called when a remote call fails after a positive probe: the next
    /// `check` probes again instead of trusting the stale verdict.
    pub async fn report_failure(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, Availability::Available { .. }) {
            debug!("Remote failure reported, availability reset to unknown");
            *state = Availability::Unknown;
        }
    }

    pub async fn status(&self) -> Availability {
        *self.state.lock().await
    }

    pub async fn backend_status(&self) -> BackendStatus {
        BackendStatus {
            availability: self.status().await,
            health_url: self.health_url.clone(),
            probes_sent: self.probe_count(),
        }
    }

    pub fn probe_count(&self) -> u64 {
        self.probes_sent.load(Ordering::Relaxed)
    }
}
