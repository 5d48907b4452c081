use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub redis: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.redis
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Redis Connectivity:    {}", status(self.redis));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        redis: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_redis(&config.redis_url).await {
        report.redis = false;
        report.errors.push(format!("Redis: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.redis_url.is_empty() {
        anyhow::bail!("REDIS_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.vnpay.hash_secret.is_empty() {
        anyhow::bail!("VNPAY_HASH_SECRET is empty");
    }
    if config.momo.secret_key.is_empty() {
        anyhow::bail!("MOMO_SECRET_KEY is empty");
    }
    if config.sweep_stale_after_minutes <= 0 {
        anyhow::bail!("SWEEP_STALE_AFTER_MINUTES must be greater than 0");
    }

    url::Url::parse(&config.vnpay.pay_url).context("VNPAY_PAY_URL is not a valid URL")?;
    url::Url::parse(&config.momo.endpoint).context("MOMO_ENDPOINT is not a valid URL")?;

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_redis(redis_url: &str) -> Result<()> {
    let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;

    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .context("Failed to connect to Redis")?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .context("Redis PING failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MomoConfig, VnpayConfig};

    fn test_config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost:5432/wallet".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            cors_allowed_origins: None,
            vnpay: VnpayConfig {
                tmn_code: "TESTTMN".to_string(),
                hash_secret: "secret".to_string(),
                pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
                return_url: "https://example.com/return".to_string(),
            },
            momo: MomoConfig {
                partner_code: "MOMOTEST".to_string(),
                access_key: "access".to_string(),
                secret_key: "secret".to_string(),
                endpoint: "https://test-payment.momo.vn/v2/gateway/api/create".to_string(),
                redirect_url: "https://example.com/return".to_string(),
                ipn_url: "https://example.com/callback".to_string(),
            },
            sweep_interval_secs: 300,
            sweep_stale_after_minutes: 30,
            fraud_max_amount: 20_000_000,
            fraud_max_payments_per_hour: 10,
        }
    }

    #[test]
    fn test_validate_env_vars_ok() {
        assert!(validate_env_vars(&test_config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_empty_database_url() {
        let mut config = test_config();
        config.database_url = String::new();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_empty_provider_secret() {
        let mut config = test_config();
        config.vnpay.hash_secret = String::new();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_url() {
        let mut config = test_config();
        config.momo.endpoint = "not-a-url".to_string();
        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_nonpositive_sweep_threshold() {
        let mut config = test_config();
        config.sweep_stale_after_minutes = 0;
        assert!(validate_env_vars(&config).is_err());
    }
}
