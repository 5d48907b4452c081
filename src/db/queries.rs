use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as DbTransaction};
use uuid::Uuid;

use crate::db::models::{Transaction, TransactionStatus, UserWallet};

// --- Transaction queries ---

pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, tx_type, amount, reward_value, status,
            provider, provider_tx_id, description, reference_id, notes,
            created_at, processed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.tx_type)
    .bind(&tx.amount)
    .bind(tx.reward_value)
    .bind(tx.status)
    .bind(tx.provider)
    .bind(&tx.provider_tx_id)
    .bind(&tx.description)
    .bind(&tx.reference_id)
    .bind(&tx.notes)
    .bind(tx.created_at)
    .bind(tx.processed_at)
    .fetch_one(pool)
    .await
}

/// Insert a completed internal ledger row inside an already-open atomic block.
pub async fn insert_transaction_tx(
    db_tx: &mut DbTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, tx_type, amount, reward_value, status,
            provider, provider_tx_id, description, reference_id, notes,
            created_at, processed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.tx_type)
    .bind(&tx.amount)
    .bind(tx.reward_value)
    .bind(tx.status)
    .bind(tx.provider)
    .bind(&tx.provider_tx_id)
    .bind(&tx.description)
    .bind(&tx.reference_id)
    .bind(&tx.notes)
    .bind(tx.created_at)
    .bind(tx.processed_at)
    .fetch_one(&mut **db_tx)
    .await
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Row-locked load used inside completion atomic blocks to re-validate state.
pub async fn get_transaction_for_update(
    db_tx: &mut DbTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **db_tx)
        .await
}

/// Move a PENDING transaction to a terminal state. The `status = 'PENDING'`
/// guard makes the transition at-most-once even if callers race.
pub async fn mark_terminal(
    db_tx: &mut DbTransaction<'_, Postgres>,
    id: Uuid,
    status: TransactionStatus,
    provider_tx_id: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE transactions
        SET status = $2, provider_tx_id = COALESCE($3, provider_tx_id), processed_at = NOW()
        WHERE id = $1 AND status = 'PENDING'
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(provider_tx_id)
    .execute(&mut **db_tx)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_user_transactions(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// PENDING transactions created before the cutoff, oldest first.
pub async fn stale_pending_ids(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM transactions WHERE status = 'PENDING' AND created_at < $1 ORDER BY created_at ASC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Sweep a single stale transaction to FAILED. Returns false if it reached a
/// terminal state in the meantime, which makes repeated sweeps a no-op.
pub async fn fail_stale_transaction(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE transactions SET status = 'FAILED', processed_at = NOW() WHERE id = $1 AND status = 'PENDING'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

// --- Wallet queries ---

pub async fn get_wallet(pool: &PgPool, user_id: Uuid) -> Result<Option<UserWallet>> {
    sqlx::query_as::<_, UserWallet>(
        "SELECT id, gold_balance, vip_tier, vip_expires_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_wallet_for_update(
    db_tx: &mut DbTransaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<UserWallet>> {
    sqlx::query_as::<_, UserWallet>(
        "SELECT id, gold_balance, vip_tier, vip_expires_at FROM users WHERE id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **db_tx)
    .await
}

/// Conditional decrement. Zero updated rows means insufficient balance and is
/// authoritative; callers must not retry it blindly.
pub async fn debit_gold(
    db_tx: &mut DbTransaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE users
        SET gold_balance = gold_balance - $2, updated_at = NOW()
        WHERE id = $1 AND gold_balance >= $2
        RETURNING gold_balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut **db_tx)
    .await
}

pub async fn credit_gold(
    db_tx: &mut DbTransaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE users
        SET gold_balance = gold_balance + $2, updated_at = NOW()
        WHERE id = $1
        RETURNING gold_balance
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut **db_tx)
    .await
}

/// Write a new VIP expiry; tier-0 users are promoted to tier 1, existing
/// tiers are preserved.
pub async fn set_vip_expiry(
    db_tx: &mut DbTransaction<'_, Postgres>,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET vip_tier = GREATEST(vip_tier, 1), vip_expires_at = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(expires_at)
    .execute(&mut **db_tx)
    .await?;

    Ok(())
}

/// Seed a user row. Used by admin tooling and integration tests.
pub async fn insert_user(pool: &PgPool, user_id: Uuid, gold_balance: i64) -> Result<UserWallet> {
    sqlx::query_as::<_, UserWallet>(
        r#"
        INSERT INTO users (id, gold_balance)
        VALUES ($1, $2)
        RETURNING id, gold_balance, vip_tier, vip_expires_at
        "#,
    )
    .bind(user_id)
    .bind(gold_balance)
    .fetch_one(pool)
    .await
}
