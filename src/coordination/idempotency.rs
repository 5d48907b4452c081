use crate::error::AppError;

const MARKER_PREFIX: &str = "payment:done:";

/// Outlasts provider retry windows without leaking keys forever.
const MARKER_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Write-once marker recording that an external transaction id has been
/// finalized.
///
/// `claim` is a single atomic set-if-absent, not a read-then-write pair, so
/// two concurrent callback deliveries can never both observe "not claimed".
/// Redis failures propagate: a guard that fails open would double-credit.
#[derive(Clone)]
pub struct IdempotencyGuard {
    client: redis::Client,
}

impl IdempotencyGuard {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// True only for the first caller for a given id within the TTL window.
    pub async fn claim(&self, external_id: &str) -> Result<bool, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let set: Option<String> = redis::cmd("SET")
            .arg(format!("{}{}", MARKER_PREFIX, external_id))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(MARKER_TTL_SECS)
            .query_async(&mut conn)
            .await?;

        Ok(set.is_some())
    }
}
