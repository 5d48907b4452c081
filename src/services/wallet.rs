//! Wallet service: internally-triggered gold mutations.
//!
//! Every mutation runs under the per-wallet lock and inside one database
//! transaction, so concurrent spends against the same user serialize while
//! different users proceed in parallel.

use sqlx::PgPool;
use uuid::Uuid;

use crate::coordination::{BalanceCache, DistributedLock};
use crate::db::models::{Transaction, TransactionType, UserWallet};
use crate::db::queries;
use crate::error::AppError;

const WALLET_LOCK_TTL_SECS: u64 = 10;

#[derive(Debug)]
pub struct SpendOutcome {
    pub new_balance: i64,
    pub transaction: Transaction,
}

#[derive(Debug)]
pub struct CreditOutcome {
    pub new_balance: i64,
    pub transaction: Transaction,
}

#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
    lock: DistributedLock,
    cache: BalanceCache,
}

impl WalletService {
    pub fn new(pool: PgPool, lock: DistributedLock, cache: BalanceCache) -> Self {
        Self { pool, lock, cache }
    }

    fn lock_key(user_id: Uuid) -> String {
        format!("wallet:{}", user_id)
    }

    /// Debit gold from a wallet and record the COMPLETED ledger row in the
    /// same atomic block. Zero rows from the conditional decrement is an
    /// authoritative InsufficientBalance, even if the pre-check passed.
    pub async fn spend(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<SpendOutcome, AppError> {
        if amount <= 0 {
            return Err(AppError::Validation("spend amount must be positive".to_string()));
        }

        let key = Self::lock_key(user_id);
        if !self.lock.acquire(&key, WALLET_LOCK_TTL_SECS).await? {
            return Err(AppError::ResourceBusy(format!("wallet {} is busy", user_id)));
        }

        let result = self.spend_locked(user_id, amount, description, reference_id).await;
        self.lock.release(&key).await;

        if result.is_ok() {
            self.cache.invalidate(user_id).await;
        }
        result
    }

    async fn spend_locked(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<SpendOutcome, AppError> {
        let wallet = queries::get_wallet(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        if wallet.gold_balance < amount {
            return Err(AppError::InsufficientBalance {
                balance: wallet.gold_balance,
                requested: amount,
            });
        }

        let mut db_tx = self.pool.begin().await?;

        let Some(new_balance) = queries::debit_gold(&mut db_tx, user_id, amount).await? else {
            // The lock normally prevents this; the conditional update is what
            // keeps the balance correct if the lock expired mid-operation.
            db_tx.rollback().await?;
            return Err(AppError::InsufficientBalance {
                balance: wallet.gold_balance,
                requested: amount,
            });
        };

        let record = Transaction::completed_internal(
            user_id,
            TransactionType::SpendGold,
            -amount,
            description.to_string(),
            reference_id.map(str::to_string),
        );
        let transaction = queries::insert_transaction_tx(&mut db_tx, &record).await?;

        db_tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            tx = %transaction.id,
            amount = amount,
            new_balance = new_balance,
            "gold spent"
        );

        Ok(SpendOutcome {
            new_balance,
            transaction,
        })
    }

    /// Additive counterpart to `spend`; used for rewards, refunds, and admin
    /// adjustments. No balance precondition.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        tx_type: TransactionType,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<CreditOutcome, AppError> {
        if amount <= 0 {
            return Err(AppError::Validation("credit amount must be positive".to_string()));
        }

        let key = Self::lock_key(user_id);
        if !self.lock.acquire(&key, WALLET_LOCK_TTL_SECS).await? {
            return Err(AppError::ResourceBusy(format!("wallet {} is busy", user_id)));
        }

        let result = self
            .credit_locked(user_id, amount, tx_type, description, reference_id)
            .await;
        self.lock.release(&key).await;

        if result.is_ok() {
            self.cache.invalidate(user_id).await;
        }
        result
    }

    async fn credit_locked(
        &self,
        user_id: Uuid,
        amount: i64,
        tx_type: TransactionType,
        description: &str,
        reference_id: Option<&str>,
    ) -> Result<CreditOutcome, AppError> {
        let mut db_tx = self.pool.begin().await?;

        let new_balance = queries::credit_gold(&mut db_tx, user_id, amount)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        let record = Transaction::completed_internal(
            user_id,
            tx_type,
            amount,
            description.to_string(),
            reference_id.map(str::to_string),
        );
        let transaction = queries::insert_transaction_tx(&mut db_tx, &record).await?;

        db_tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            tx = %transaction.id,
            amount = amount,
            new_balance = new_balance,
            "gold credited"
        );

        Ok(CreditOutcome {
            new_balance,
            transaction,
        })
    }

    /// Plain read through the snapshot cache; no locking.
    pub async fn get_balance(&self, user_id: Uuid) -> Result<UserWallet, AppError> {
        if let Some(cached) = self.cache.get(user_id).await {
            return Ok(cached);
        }

        let wallet = queries::get_wallet(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        self.cache.put(&wallet).await;
        Ok(wallet)
    }
}
