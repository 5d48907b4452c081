use redis::AsyncCommands;
use uuid::Uuid;

use crate::db::models::UserWallet;

const CACHE_PREFIX: &str = "wallet:cache:";
const CACHE_TTL_SECS: u64 = 60;

/// Read-through cache for wallet snapshots. Strictly best-effort: every
/// operation fails open and correctness never depends on it, only the
/// invalidation discipline in the mutating services does.
#[derive(Clone)]
pub struct BalanceCache {
    client: redis::Client,
}

impl BalanceCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, user_id: Uuid) -> Option<UserWallet> {
        let mut conn = self.client.get_multiplexed_async_connection().await.ok()?;
        let raw: Option<String> = conn.get(format!("{}{}", CACHE_PREFIX, user_id)).await.ok()?;
        raw.and_then(|value| serde_json::from_str(&value).ok())
    }

    pub async fn put(&self, wallet: &UserWallet) {
        let Ok(serialized) = serde_json::to_string(wallet) else {
            return;
        };
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            let result: redis::RedisResult<()> = conn
                .set_ex(format!("{}{}", CACHE_PREFIX, wallet.id), serialized, CACHE_TTL_SECS)
                .await;
            if let Err(e) = result {
                tracing::debug!(user_id = %wallet.id, error = %e, "wallet cache put failed");
            }
        }
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            let result: redis::RedisResult<()> =
                conn.del(format!("{}{}", CACHE_PREFIX, user_id)).await;
            if let Err(e) = result {
                tracing::warn!(user_id = %user_id, error = %e, "wallet cache invalidation failed");
            }
        }
    }
}
