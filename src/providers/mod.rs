//! Payment gateway adapters.
//!
//! Each adapter knows how to build a signed payment request for its gateway
//! and how to verify the keyed hash on the gateway's callback. A signature
//! mismatch is a hard rejection; callers must not touch the idempotency
//! guard for a rejected callback so a legitimately-signed retry can still
//! succeed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::Provider;
use crate::error::AppError;

pub mod momo;
pub mod vnpay;

pub use momo::MomoAdapter;
pub use vnpay::VnpayAdapter;

/// What the engine needs the gateway to collect.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    /// Our transaction id, passed through as the gateway's order reference.
    pub transaction_id: Uuid,
    pub amount: BigDecimal,
    pub description: String,
    pub client_ip: Option<String>,
}

/// Outcome of a verified callback, translated out of provider vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackVerdict {
    pub transaction_id: Uuid,
    pub provider_tx_id: Option<String>,
    pub success: bool,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Build the gateway redirect URL the client should be sent to.
    async fn create_payment_request(&self, order: &PaymentOrder) -> Result<String, AppError>;

    /// Recompute the keyed hash over the callback fields and translate the
    /// gateway's result code. Fails with `SignatureInvalid` on any mismatch.
    fn verify_callback(&self, params: &BTreeMap<String, String>) -> Result<CallbackVerdict, AppError>;
}

#[derive(Clone)]
pub struct ProviderRegistry {
    vnpay: VnpayAdapter,
    momo: MomoAdapter,
}

impl ProviderRegistry {
    pub fn new(config: &Config) -> Self {
        Self {
            vnpay: VnpayAdapter::new(config.vnpay.clone()),
            momo: MomoAdapter::new(config.momo.clone()),
        }
    }

    pub fn get(&self, provider: Provider) -> Result<&dyn ProviderAdapter, AppError> {
        match provider {
            Provider::Vnpay => Ok(&self.vnpay),
            Provider::Momo => Ok(&self.momo),
            Provider::Internal => Err(AppError::Validation(
                "internal transactions have no payment gateway".to_string(),
            )),
        }
    }
}
