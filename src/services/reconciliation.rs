use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::db::queries;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepReport {
    /// Stale PENDING transactions found.
    pub scanned: usize,
    /// Transitioned to FAILED by this pass.
    pub failed: usize,
    /// Raced to a terminal state elsewhere, or errored and left for the next
    /// pass.
    pub skipped: usize,
}

/// Backstop for transactions whose provider callback never arrives.
/// PENDING rows never touched the balance, so failing them has no wallet
/// effect.
#[derive(Clone)]
pub struct ReconciliationService {
    pool: PgPool,
}

impl ReconciliationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fail every PENDING transaction older than the cutoff. The per-row
    /// `status = 'PENDING'` guard makes a second pass over the same set a
    /// no-op. Individual failures never abort the batch.
    pub async fn sweep_stale(&self, older_than_minutes: i64) -> Result<SweepReport, AppError> {
        let cutoff = Utc::now() - Duration::minutes(older_than_minutes);
        let stale = queries::stale_pending_ids(&self.pool, cutoff).await?;

        let mut failed = 0;
        let mut skipped = 0;
        for id in &stale {
            match queries::fail_stale_transaction(&self.pool, *id).await {
                Ok(true) => {
                    info!(tx = %id, "stale pending transaction failed by sweep");
                    failed += 1;
                }
                Ok(false) => skipped += 1,
                Err(e) => {
                    error!(tx = %id, error = %e, "sweep failed for transaction, skipping");
                    skipped += 1;
                }
            }
        }

        Ok(SweepReport {
            scanned: stale.len(),
            failed,
            skipped,
        })
    }
}

/// Background sweep loop. Runs until the process exits.
pub async fn run_sweeper(service: ReconciliationService, interval_secs: u64, older_than_minutes: i64) {
    info!(
        interval_secs = interval_secs,
        older_than_minutes = older_than_minutes,
        "reconciliation sweeper started"
    );

    loop {
        match service.sweep_stale(older_than_minutes).await {
            Ok(report) if report.failed > 0 => {
                info!(
                    scanned = report.scanned,
                    failed = report.failed,
                    skipped = report.skipped,
                    "sweep pass resolved stale transactions"
                );
            }
            Ok(_) => debug!("sweep pass found nothing to resolve"),
            Err(e) => error!("sweep batch error: {}", e),
        }

        sleep(std::time::Duration::from_secs(interval_secs)).await;
    }
}
