use uuid::Uuid;

use crate::error::AppError;

const LOCK_PREFIX: &str = "lock:";

/// Mutual exclusion keyed by resource name, backed by Redis.
///
/// Acquisition is a single `SET key token NX EX ttl`; the TTL bounds the
/// damage of a crashed holder, trading strict exclusion for liveness.
#[derive(Clone)]
pub struct DistributedLock {
    client: redis::Client,
}

impl DistributedLock {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Returns false if the lock is already held. Callers must surface that
    /// as a retryable busy condition, never proceed without the lock.
    pub async fn acquire(&self, key: &str, ttl_secs: u64) -> Result<bool, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token = Uuid::new_v4().to_string();

        let set: Option<String> = redis::cmd("SET")
            .arg(format!("{}{}", LOCK_PREFIX, key))
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;

        Ok(set.is_some())
    }

    /// Best-effort release without an ownership check; the TTL already bounds
    /// staleness if this fails or deletes a successor's lock.
    pub async fn release(&self, key: &str) {
        let full_key = format!("{}{}", LOCK_PREFIX, key);
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: redis::RedisResult<()> =
                    redis::cmd("DEL").arg(&full_key).query_async(&mut conn).await;
                if let Err(e) = result {
                    tracing::warn!(key = %full_key, error = %e, "failed to release lock");
                }
            }
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "failed to release lock");
            }
        }
    }
}
