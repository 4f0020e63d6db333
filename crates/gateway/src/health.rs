use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use vaidya_core::credential::HealthCheckRecord;
use vaidya_core::CredentialStatus;
use vaidya_provider::{HuggingFaceClient, ModelCatalog, ProviderAdapter};
use vaidya_store::{CredentialStore, HealthCheckStore};

use crate::credentials::CredentialService;
use crate::error::GatewayError;

/// Default probe interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Result summary of one monitoring cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleSummary {
    pub probed: usize,
    pub healthy: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Periodically probes every active credential so operators learn of
/// breakage before end users do.
///
/// The monitor is a single supervised task owned by the process lifecycle:
/// spawn it once at boot and cancel it at shutdown. It must not be started
/// more than once per process.
#[derive(Clone)]
pub struct HealthMonitor {
    credentials: CredentialService,
    credential_rows: Arc<dyn CredentialStore>,
    health: Arc<dyn HealthCheckStore>,
    adapter: Arc<dyn ProviderAdapter>,
    fallback: Option<Arc<HuggingFaceClient>>,
    catalog: Arc<ModelCatalog>,
    interval: Duration,
}

impl HealthMonitor {
    /// Build the monitor.
    #[must_use]
    pub fn new(
        credentials: CredentialService,
        credential_rows: Arc<dyn CredentialStore>,
        health: Arc<dyn HealthCheckStore>,
        adapter: Arc<dyn ProviderAdapter>,
        fallback: Option<Arc<HuggingFaceClient>>,
        catalog: Arc<ModelCatalog>,
        interval: Duration,
    ) -> Self {
        Self {
            credentials,
            credential_rows,
            health,
            adapter,
            fallback,
            catalog,
            interval,
        }
    }

    /// Spawn the monitoring loop. Returns the task handle; cancel the token
    /// and await the handle for a clean shutdown.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run until cancelled, probing on a fixed interval.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "health monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("health monitor stopping");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(summary) => debug!(
                            probed = summary.probed,
                            healthy = summary.healthy,
                            failed = summary.failed,
                            skipped = summary.skipped,
                            "health check cycle complete"
                        ),
                        Err(e) => error!(error = %e, "health check cycle failed"),
                    }
                }
            }
        }
    }

    /// Probe every active credential once, then the fallback models.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleSummary, GatewayError> {
        let rows = self.credential_rows.list_credentials().await?;
        let active: Vec<_> = rows
            .into_iter()
            .filter(|c| c.status == CredentialStatus::Active)
            .collect();

        let mut summary = CycleSummary {
            probed: active.len(),
            ..CycleSummary::default()
        };
        info!(count = active.len(), "running credential health checks");

        for credential in active {
            let secret = match self.credentials.decrypt_secret(&credential.ciphertext) {
                Ok(secret) => secret,
                Err(e) => {
                    warn!(id = %credential.id, error = %e, "skipping unusable credential in probe");
                    summary.skipped += 1;
                    summary.probed -= 1;
                    continue;
                }
            };

            use vaidya_crypto::ExposeSecret;
            let started = Instant::now();
            let result = self
                .adapter
                .probe(secret.expose_secret(), &credential.feature)
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(_) => {
                    summary.healthy += 1;
                    self.append_record(&credential.id, "healthy", Some(latency_ms), None)
                        .await;
                    if let Err(e) = self.credentials.record_success(&credential.id).await {
                        warn!(id = %credential.id, error = %e, "failed to clear failure count");
                    }
                    debug!(id = %credential.id, latency_ms, "probe passed");
                }
                Err(e) => {
                    summary.failed += 1;
                    let error_text = e.to_string();
                    self.append_record(
                        &credential.id,
                        "failed",
                        Some(latency_ms),
                        Some(error_text.clone()),
                    )
                    .await;
                    warn!(
                        id = %credential.id,
                        provider = %credential.provider,
                        feature = %credential.feature,
                        error = %error_text,
                        "probe failed"
                    );
                    if let Err(record_err) = self
                        .credentials
                        .record_failure(&credential.id, &error_text)
                        .await
                    {
                        warn!(id = %credential.id, error = %record_err, "failed to record probe failure");
                    }
                }
            }
        }

        self.probe_fallback_models().await;
        Ok(summary)
    }

    /// Probe the free-tier fallback models on the same cadence. Results are
    /// logged; fallback models have no credential row to promote.
    async fn probe_fallback_models(&self) {
        let Some(client) = &self.fallback else {
            return;
        };
        for (feature, model, result) in client.probe_fallback_models(&self.catalog).await {
            match result {
                Ok(_) => debug!(feature, model, "fallback model probe passed"),
                Err(e) => warn!(feature, model, error = %e, "fallback model probe failed"),
            }
        }
    }

    /// Append one probe record; storage failures are logged, never fatal to
    /// the cycle.
    async fn append_record(
        &self,
        credential_id: &str,
        status: &str,
        latency_ms: Option<u64>,
        error: Option<String>,
    ) {
        let record = HealthCheckRecord {
            id: Uuid::new_v4().to_string(),
            credential_id: credential_id.to_owned(),
            checked_at: Utc::now(),
            status: status.to_owned(),
            latency_ms,
            error,
        };
        if let Err(e) = self.health.append_health_check(record).await {
            warn!(credential_id, error = %e, "failed to append health check record");
        }
    }
}
