use redis::AsyncCommands;

use crate::error::AppError;

/// Windowed counters via atomic INCR with expiry. Replaces in-process rate
/// counters so counts survive horizontal scaling.
#[derive(Clone)]
pub struct RateCounter {
    client: redis::Client,
}

impl RateCounter {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Increment the counter at `key`, starting its expiry window on the
    /// first increment. Returns the count within the current window.
    pub async fn incr(&self, key: &str, window_secs: i64) -> Result<i64, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
        }

        Ok(count)
    }
}
