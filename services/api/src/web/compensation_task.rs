//! services/api/src/web/compensation_task.rs
//!
//! The background worker that retries failed blob deletes recorded in the
//! compensation log.

use procurement_core::workflow::CompensationReport;
use procurement_core::ProcurementWorkflow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Retries pending compensations every `every` until cancelled.
///
/// The first pass runs immediately, so leftovers from a previous run are picked
/// up at startup.
pub async fn compensation_process(
    workflow: Arc<ProcurementWorkflow>,
    every: Duration,
    cancellation_token: CancellationToken,
) {
    info!(interval_secs = every.as_secs(), "Compensation retry task started.");
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Compensation retry task cancelled.");
                return;
            }
            _ = ticker.tick() => {}
        }

        match workflow.retry_compensations().await {
            Ok(report) if report == CompensationReport::default() => {
                debug!("No pending compensations");
            }
            Ok(report) => info!(
                resolved = report.resolved,
                failed = report.failed,
                abandoned = report.abandoned,
                "Retried pending compensations"
            ),
            Err(e) => error!(error = %e, "Failed to read the compensation log"),
        }
    }
}
