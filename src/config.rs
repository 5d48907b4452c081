use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub cors_allowed_origins: Option<String>,
    pub vnpay: VnpayConfig,
    pub momo: MomoConfig,
    pub sweep_interval_secs: u64,
    pub sweep_stale_after_minutes: i64,
    pub fraud_max_amount: i64,
    pub fraud_max_payments_per_hour: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            vnpay: VnpayConfig {
                tmn_code: env::var("VNPAY_TMN_CODE")?,
                hash_secret: env::var("VNPAY_HASH_SECRET")?,
                pay_url: env::var("VNPAY_PAY_URL")
                    .unwrap_or_else(|_| "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()),
                return_url: env::var("VNPAY_RETURN_URL")?,
            },
            momo: MomoConfig {
                partner_code: env::var("MOMO_PARTNER_CODE")?,
                access_key: env::var("MOMO_ACCESS_KEY")?,
                secret_key: env::var("MOMO_SECRET_KEY")?,
                endpoint: env::var("MOMO_ENDPOINT")
                    .unwrap_or_else(|_| "https://test-payment.momo.vn/v2/gateway/api/create".to_string()),
                redirect_url: env::var("MOMO_REDIRECT_URL")?,
                ipn_url: env::var("MOMO_IPN_URL")?,
            },
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            sweep_stale_after_minutes: env::var("SWEEP_STALE_AFTER_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            fraud_max_amount: env::var("FRAUD_MAX_AMOUNT")
                .unwrap_or_else(|_| "20000000".to_string())
                .parse()?,
            fraud_max_payments_per_hour: env::var("FRAUD_MAX_PAYMENTS_PER_HOUR")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        })
    }
}
