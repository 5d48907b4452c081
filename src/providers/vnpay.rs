//! VNPay-style adapter: redirect URL with an HMAC-SHA512 seal over the
//! alphabetically-sorted, urlencoded request parameters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use uuid::Uuid;

use crate::config::VnpayConfig;
use crate::db::models::Provider;
use crate::error::AppError;
use crate::providers::{CallbackVerdict, PaymentOrder, ProviderAdapter};

type HmacSha512 = Hmac<Sha512>;

const SUCCESS_RESPONSE_CODE: &str = "00";

#[derive(Clone)]
pub struct VnpayAdapter {
    config: VnpayConfig,
}

impl VnpayAdapter {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    /// Canonical form: parameters sorted by key, urlencoded, joined with `&`.
    /// Empty values and the hash fields themselves are excluded.
    fn canonical_query(params: &BTreeMap<String, String>) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            if value.is_empty() || key == "vnp_SecureHash" || key == "vnp_SecureHashType" {
                continue;
            }
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    fn sign(&self, canonical: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, canonical: &str, signature_hex: &str) -> Result<(), AppError> {
        let expected = hex::decode(signature_hex)
            .map_err(|_| AppError::SignatureInvalid("malformed signature encoding".to_string()))?;

        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(canonical.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AppError::SignatureInvalid("checksum mismatch".to_string()))
    }
}

#[async_trait]
impl ProviderAdapter for VnpayAdapter {
    fn provider(&self) -> Provider {
        Provider::Vnpay
    }

    async fn create_payment_request(&self, order: &PaymentOrder) -> Result<String, AppError> {
        // The gateway expects the amount multiplied by 100.
        let gateway_amount = (&order.amount * BigDecimal::from(100)).with_scale(0);

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), "2.1.0".to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), gateway_amount.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), order.transaction_id.to_string());
        params.insert("vnp_OrderInfo".to_string(), order.description.clone());
        params.insert("vnp_OrderType".to_string(), "other".to_string());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert(
            "vnp_IpAddr".to_string(),
            order.client_ip.clone().unwrap_or_else(|| "127.0.0.1".to_string()),
        );
        params.insert(
            "vnp_CreateDate".to_string(),
            Utc::now().format("%Y%m%d%H%M%S").to_string(),
        );

        let canonical = Self::canonical_query(&params);
        let signature = self.sign(&canonical);

        Ok(format!(
            "{}?{}&vnp_SecureHash={}",
            self.config.pay_url, canonical, signature
        ))
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>) -> Result<CallbackVerdict, AppError> {
        let signature = params
            .get("vnp_SecureHash")
            .ok_or_else(|| AppError::SignatureInvalid("missing vnp_SecureHash".to_string()))?;

        let canonical = Self::canonical_query(params);
        self.verify(&canonical, signature)?;

        let transaction_id = params
            .get("vnp_TxnRef")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| AppError::Validation("missing or malformed vnp_TxnRef".to_string()))?;

        let success = params.get("vnp_ResponseCode").map(String::as_str)
            == Some(SUCCESS_RESPONSE_CODE);

        Ok(CallbackVerdict {
            transaction_id,
            provider_tx_id: params.get("vnp_TransactionNo").cloned(),
            success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> VnpayAdapter {
        VnpayAdapter::new(VnpayConfig {
            tmn_code: "TESTTMN".to_string(),
            hash_secret: "test_hash_secret".to_string(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "https://example.com/payments/vnpay/return".to_string(),
        })
    }

    fn signed_callback(adapter: &VnpayAdapter, tx_id: Uuid, response_code: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("vnp_Amount".to_string(), "5000000".to_string());
        params.insert("vnp_TxnRef".to_string(), tx_id.to_string());
        params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
        params.insert("vnp_TransactionNo".to_string(), "14422574".to_string());

        let canonical = VnpayAdapter::canonical_query(&params);
        let signature = adapter.sign(&canonical);
        params.insert("vnp_SecureHash".to_string(), signature);
        params
    }

    #[tokio::test]
    async fn create_payment_request_is_signed_and_self_consistent() {
        let adapter = adapter();
        let order = PaymentOrder {
            transaction_id: Uuid::new_v4(),
            amount: BigDecimal::from(50000),
            description: "50 gold pack".to_string(),
            client_ip: None,
        };

        let redirect = adapter.create_payment_request(&order).await.unwrap();
        assert!(redirect.starts_with(&adapter.config.pay_url));
        assert!(redirect.contains("vnp_Amount=5000000"));
        assert!(redirect.contains("vnp_SecureHash="));

        // The signed query must verify against our own check.
        let parsed = url::Url::parse(&redirect).unwrap();
        let params: BTreeMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let canonical = VnpayAdapter::canonical_query(&params);
        adapter
            .verify(&canonical, params.get("vnp_SecureHash").unwrap())
            .unwrap();
    }

    #[test]
    fn valid_callback_verifies_and_maps_success() {
        let adapter = adapter();
        let tx_id = Uuid::new_v4();
        let params = signed_callback(&adapter, tx_id, "00");

        let verdict = adapter.verify_callback(&params).unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.transaction_id, tx_id);
        assert_eq!(verdict.provider_tx_id.as_deref(), Some("14422574"));
    }

    #[test]
    fn failure_response_code_maps_to_unsuccessful() {
        let adapter = adapter();
        let params = signed_callback(&adapter, Uuid::new_v4(), "24");

        let verdict = adapter.verify_callback(&params).unwrap();
        assert!(!verdict.success);
    }

    #[test]
    fn tampered_amount_is_rejected_hard() {
        let adapter = adapter();
        let mut params = signed_callback(&adapter, Uuid::new_v4(), "00");
        params.insert("vnp_Amount".to_string(), "9999999".to_string());

        let result = adapter.verify_callback(&params);
        assert!(matches!(result, Err(AppError::SignatureInvalid(_))));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let adapter = adapter();
        let mut params = signed_callback(&adapter, Uuid::new_v4(), "00");
        params.remove("vnp_SecureHash");

        let result = adapter.verify_callback(&params);
        assert!(matches!(result, Err(AppError::SignatureInvalid(_))));
    }

    #[test]
    fn malformed_signature_encoding_is_rejected() {
        let adapter = adapter();
        let mut params = signed_callback(&adapter, Uuid::new_v4(), "00");
        params.insert("vnp_SecureHash".to_string(), "not-hex!".to_string());

        let result = adapter.verify_callback(&params);
        assert!(matches!(result, Err(AppError::SignatureInvalid(_))));
    }

    #[test]
    fn malformed_order_reference_is_a_validation_error() {
        let adapter = adapter();
        let mut params = BTreeMap::new();
        params.insert("vnp_TxnRef".to_string(), "not-a-uuid".to_string());
        params.insert("vnp_ResponseCode".to_string(), "00".to_string());
        let canonical = VnpayAdapter::canonical_query(&params);
        let signature = adapter.sign(&canonical);
        params.insert("vnp_SecureHash".to_string(), signature);

        let result = adapter.verify_callback(&params);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
