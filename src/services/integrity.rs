//! Coordination layer for externally-triggered payment completions.
//!
//! Duplicate callback delivery is resolved by the idempotency guard before
//! any lock is contended; the per-transaction lock plus the status-guarded
//! terminal update are the second and third barriers. The balance mutation
//! is inlined into the completion atomic block, never re-entering the
//! wallet service's own lock.

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::coordination::{BalanceCache, DistributedLock, IdempotencyGuard};
use crate::db::models::{RewardEffect, TransactionStatus};
use crate::db::queries;
use crate::error::AppError;
use crate::providers::CallbackVerdict;

const COMPLETION_LOCK_TTL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Transaction marked COMPLETED and its reward applied.
    Completed,
    /// Provider reported failure; transaction marked FAILED, no balance effect.
    MarkedFailed,
    /// Duplicate delivery or terminal-on-arrival. Success-shaped so the
    /// provider stops retrying.
    AlreadyProcessed,
}

#[derive(Clone)]
pub struct TransactionIntegrityService {
    pool: PgPool,
    lock: DistributedLock,
    guard: IdempotencyGuard,
    cache: BalanceCache,
}

impl TransactionIntegrityService {
    pub fn new(
        pool: PgPool,
        lock: DistributedLock,
        guard: IdempotencyGuard,
        cache: BalanceCache,
    ) -> Self {
        Self {
            pool,
            lock,
            guard,
            cache,
        }
    }

    /// First claim wins; every later claim for the same id within the marker
    /// TTL returns false.
    pub async fn ensure_idempotency(&self, transaction_id: Uuid) -> Result<bool, AppError> {
        self.guard.claim(&transaction_id.to_string()).await
    }

    /// Run `op` inside one database transaction under `lock_key`. The lock is
    /// released on every path; a held lock surfaces as ResourceBusy so the
    /// provider retries later, which is safe behind the idempotency guard.
    pub async fn execute_atomic<T, F>(
        &self,
        lock_key: &str,
        ttl_secs: u64,
        op: F,
    ) -> Result<T, AppError>
    where
        F: for<'t> FnOnce(&'t mut DbTransaction<'static, Postgres>) -> BoxFuture<'t, Result<T, AppError>>,
    {
        if !self.lock.acquire(lock_key, ttl_secs).await? {
            return Err(AppError::ResourceBusy(format!(
                "{} is already being processed",
                lock_key
            )));
        }

        let result = async {
            let mut db_tx = self.pool.begin().await?;
            let value = op(&mut db_tx).await?;
            db_tx.commit().await?;
            Ok(value)
        }
        .await;

        self.lock.release(lock_key).await;
        result
    }

    /// Apply a verified provider callback to the ledger exactly once.
    pub async fn complete_payment(
        &self,
        verdict: &CallbackVerdict,
    ) -> Result<CompletionOutcome, AppError> {
        let id = verdict.transaction_id;

        // The common case for provider retry storms resolves here, without
        // ever contending for the lock.
        if !self.ensure_idempotency(id).await? {
            tracing::info!(tx = %id, "duplicate callback delivery");
            return Ok(CompletionOutcome::AlreadyProcessed);
        }

        let transaction = queries::get_transaction(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {}", id)))?;

        // Guards against idempotency-store data loss.
        if transaction.status.is_terminal() {
            tracing::warn!(tx = %id, status = ?transaction.status, "callback for terminal transaction");
            return Ok(CompletionOutcome::AlreadyProcessed);
        }

        let lock_key = format!("tx_lock:{}", id);
        let provider_tx_id = verdict.provider_tx_id.clone();

        if !verdict.success {
            self.execute_atomic(&lock_key, COMPLETION_LOCK_TTL_SECS, move |db_tx| {
                Box::pin(async move {
                    queries::mark_terminal(
                        db_tx,
                        id,
                        TransactionStatus::Failed,
                        provider_tx_id.as_deref(),
                    )
                    .await?;
                    Ok(())
                })
            })
            .await?;

            tracing::info!(tx = %id, "payment marked failed by provider");
            return Ok(CompletionOutcome::MarkedFailed);
        }

        let user_id = transaction.user_id;
        let reward = transaction.reward();

        let applied = self
            .execute_atomic(&lock_key, COMPLETION_LOCK_TTL_SECS, move |db_tx| {
                Box::pin(async move {
                    let current = queries::get_transaction_for_update(db_tx, id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("transaction {}", id)))?;
                    if current.status.is_terminal() {
                        return Ok(false);
                    }

                    queries::mark_terminal(
                        db_tx,
                        id,
                        TransactionStatus::Completed,
                        provider_tx_id.as_deref(),
                    )
                    .await?;

                    match reward {
                        RewardEffect::GoldCredit(gold) => {
                            queries::credit_gold(db_tx, user_id, gold)
                                .await?
                                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
                        }
                        RewardEffect::VipExtension(days) => {
                            let wallet = queries::get_wallet_for_update(db_tx, user_id)
                                .await?
                                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
                            let expiry = stacked_vip_expiry(Utc::now(), wallet.vip_expires_at, days);
                            queries::set_vip_expiry(db_tx, user_id, expiry).await?;
                        }
                        RewardEffect::None => {}
                    }

                    Ok(true)
                })
            })
            .await?;

        self.cache.invalidate(user_id).await;

        if applied {
            tracing::info!(tx = %id, user_id = %user_id, reward = ?reward, "payment completed");
            Ok(CompletionOutcome::Completed)
        } else {
            Ok(CompletionOutcome::AlreadyProcessed)
        }
    }
}

/// Repeated VIP purchases stack: the new expiry extends whichever is later,
/// the current expiry or now.
pub fn stacked_vip_expiry(
    now: DateTime<Utc>,
    current: Option<DateTime<Utc>>,
    days: i64,
) -> DateTime<Utc> {
    let base = current.filter(|expiry| *expiry > now).unwrap_or(now);
    base + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vip_extension_from_no_vip_starts_now() {
        let now = Utc::now();
        let expiry = stacked_vip_expiry(now, None, 30);
        assert_eq!(expiry, now + Duration::days(30));
    }

    #[test]
    fn vip_extension_stacks_on_active_vip() {
        let now = Utc::now();
        let current = now + Duration::days(10);
        let expiry = stacked_vip_expiry(now, Some(current), 30);
        // Extends the existing expiry, never shortening remaining time.
        assert_eq!(expiry, current + Duration::days(30));
    }

    #[test]
    fn vip_extension_after_lapse_restarts_from_now() {
        let now = Utc::now();
        let lapsed = now - Duration::days(5);
        let expiry = stacked_vip_expiry(now, Some(lapsed), 7);
        assert_eq!(expiry, now + Duration::days(7));
    }
}
