//! Background consumer for queued cache warm jobs.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::state::AppState;

const CONSUMER_NAME: &str = "features-api";

/// Consume warm jobs from the queue until the process exits.
///
/// Claims one job at a time, runs the warmer, then acknowledges the stream
/// entry. Queue errors back off briefly instead of tearing the task down.
pub async fn run_warm_worker(state: Arc<AppState>) {
    let Some(queue) = state.queue.clone() else {
        warn!("Warm queue not configured, worker exiting");
        return;
    };

    info!(consumer = CONSUMER_NAME, "Warm worker started");

    loop {
        match queue.claim_next(CONSUMER_NAME).await {
            Ok(Some((entry_id, job))) => {
                info!(
                    job_id = %job.id,
                    datasets = ?job.datasets,
                    "Processing warm job"
                );

                let reports = state.warmer().warm_datasets(&job.datasets).await;
                for report in &reports {
                    info!(
                        job_id = %job.id,
                        dataset = %report.dataset,
                        cache_key = %report.cache_key,
                        duration_ms = report.duration_ms,
                        "Warm job dataset finished"
                    );
                }

                if let Err(e) = queue.ack(&entry_id).await {
                    error!(job_id = %job.id, error = %e, "Failed to acknowledge warm job");
                }
            }
            Ok(None) => {
                // Claim blocked until timeout with nothing pending; loop again.
            }
            Err(e) => {
                error!(error = %e, "Warm queue read failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
