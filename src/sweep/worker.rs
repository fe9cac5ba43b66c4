//! Sweep Worker
//!
//! Background loop with two jobs: run the reconciliation sweep on an
//! interval, and resubmit transfers whose payout submission died in
//! transit. A submission timeout leaves `Processing` with no payout
//! ref; after the stale threshold the worker resumes it through the
//! coordinator, which reuses the stored idempotency key.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::ReconciliationSweep;
use crate::coordinator::TransferCoordinator;
use crate::ledger::LedgerStore;

#[derive(Debug, Clone)]
pub struct SweepWorkerConfig {
    /// How often to run a sweep cycle
    pub sweep_interval: Duration,
    /// How long a submission may sit without a payout ref before it is
    /// considered lost in transit
    pub stale_threshold: Duration,
    /// Maximum stale transfers to resubmit per cycle
    pub batch_size: usize,
}

impl Default for SweepWorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            stale_threshold: Duration::from_secs(120),
            batch_size: 50,
        }
    }
}

pub struct SweepWorker {
    sweep: Arc<ReconciliationSweep>,
    coordinator: Arc<TransferCoordinator>,
    store: Arc<dyn LedgerStore>,
    config: SweepWorkerConfig,
}

impl SweepWorker {
    pub fn new(
        sweep: Arc<ReconciliationSweep>,
        coordinator: Arc<TransferCoordinator>,
        store: Arc<dyn LedgerStore>,
        config: SweepWorkerConfig,
    ) -> Self {
        Self {
            sweep,
            coordinator,
            store,
            config,
        }
    }

    /// Run the worker loop forever.
    pub async fn run(&self) -> ! {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            stale_threshold_secs = self.config.stale_threshold.as_secs(),
            "Starting sweep worker"
        );

        loop {
            self.tick().await;
            tokio::time::sleep(self.config.sweep_interval).await;
        }
    }

    /// One worker cycle: reconcile, then resubmit stale submissions.
    /// Each half failing is logged; neither stops the other.
    pub async fn tick(&self) {
        match self.sweep.run().await {
            Ok(summary) if summary.applied > 0 || summary.errors > 0 => {
                info!(
                    applied = summary.applied,
                    errors = summary.errors,
                    "Sweep cycle applied changes"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Sweep cycle failed"),
        }

        if let Err(e) = self.resubmit_stale().await {
            error!(error = %e, "Stale resubmission scan failed");
        }
    }

    async fn resubmit_stale(&self) -> Result<usize, crate::error::EngineError> {
        let stale = self
            .store
            .find_stale_submissions(self.config.stale_threshold)
            .await?;

        if stale.is_empty() {
            debug!("No stale submissions found");
            return Ok(0);
        }

        info!(count = stale.len(), "Found stale submissions to resume");

        let mut resumed = 0;
        for record in stale.iter().take(self.config.batch_size) {
            match self.coordinator.resume(record.transfer_id).await {
                Ok(after) => {
                    if after.payout_ref.is_some() {
                        info!(
                            transfer_id = %record.transfer_id,
                            payout_ref = ?after.payout_ref,
                            "Stale submission resumed"
                        );
                        resumed += 1;
                    }
                }
                Err(e) => {
                    warn!(
                        transfer_id = %record.transfer_id,
                        error = %e,
                        "Failed to resume stale submission"
                    );
                }
            }
        }

        Ok(resumed)
    }
}
