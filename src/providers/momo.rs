//! MoMo-style adapter: server-to-server order creation returning a payUrl,
//! with HMAC-SHA256 signatures over a fixed field ordering.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::MomoConfig;
use crate::db::models::Provider;
use crate::error::AppError;
use crate::providers::{CallbackVerdict, PaymentOrder, ProviderAdapter};

type HmacSha256 = Hmac<Sha256>;

const SUCCESS_RESULT_CODE: &str = "0";

/// Field ordering the gateway signs its callback notifications with.
const IPN_SIGNED_FIELDS: [&str; 12] = [
    "amount",
    "extraData",
    "message",
    "orderId",
    "orderInfo",
    "orderType",
    "partnerCode",
    "payType",
    "requestId",
    "responseTime",
    "resultCode",
    "transId",
];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    result_code: i64,
    message: Option<String>,
    pay_url: Option<String>,
}

#[derive(Clone)]
pub struct MomoAdapter {
    config: MomoConfig,
    client: reqwest::Client,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl MomoAdapter {
    pub fn new(config: MomoConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        Self {
            config,
            client,
            circuit_breaker,
        }
    }

    fn sign(&self, raw: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(raw.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, raw: &str, signature_hex: &str) -> Result<(), AppError> {
        let expected = hex::decode(signature_hex)
            .map_err(|_| AppError::SignatureInvalid("malformed signature encoding".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.config.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(raw.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| AppError::SignatureInvalid("checksum mismatch".to_string()))
    }

    fn ipn_raw_signature(&self, params: &BTreeMap<String, String>) -> String {
        let field = |key: &str| params.get(key).map(String::as_str).unwrap_or("");
        let mut raw = format!("accessKey={}", self.config.access_key);
        for key in IPN_SIGNED_FIELDS {
            raw.push('&');
            raw.push_str(key);
            raw.push('=');
            raw.push_str(field(key));
        }
        raw
    }
}

#[async_trait]
impl ProviderAdapter for MomoAdapter {
    fn provider(&self) -> Provider {
        Provider::Momo
    }

    async fn create_payment_request(&self, order: &PaymentOrder) -> Result<String, AppError> {
        let amount = order.amount.with_scale(0).to_string();
        let amount_value: i64 = amount
            .parse()
            .map_err(|_| AppError::Validation("amount is not an integral money value".to_string()))?;

        let request_id = Uuid::new_v4().to_string();
        let order_id = order.transaction_id.to_string();

        let raw = format!(
            "accessKey={}&amount={}&extraData=&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType=captureWallet",
            self.config.access_key,
            amount,
            self.config.ipn_url,
            order_id,
            order.description,
            self.config.partner_code,
            self.config.redirect_url,
            request_id,
        );
        let signature = self.sign(&raw);

        let body = json!({
            "partnerCode": self.config.partner_code,
            "requestId": request_id,
            "amount": amount_value,
            "orderId": order_id,
            "orderInfo": order.description,
            "redirectUrl": self.config.redirect_url,
            "ipnUrl": self.config.ipn_url,
            "requestType": "captureWallet",
            "extraData": "",
            "lang": "vi",
            "signature": signature,
        });

        let client = self.client.clone();
        let endpoint = self.config.endpoint.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&endpoint)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| AppError::Gateway(format!("create order request failed: {}", e)))?;

                response
                    .json::<CreateOrderResponse>()
                    .await
                    .map_err(|e| AppError::Gateway(format!("unreadable create order response: {}", e)))
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(FailsafeError::Rejected) => {
                return Err(AppError::Gateway("gateway circuit breaker is open".to_string()));
            }
            Err(FailsafeError::Inner(e)) => return Err(e),
        };

        if response.result_code != 0 {
            return Err(AppError::Gateway(format!(
                "create order rejected: code {} ({})",
                response.result_code,
                response.message.unwrap_or_default()
            )));
        }

        response
            .pay_url
            .ok_or_else(|| AppError::Gateway("create order response missing payUrl".to_string()))
    }

    fn verify_callback(&self, params: &BTreeMap<String, String>) -> Result<CallbackVerdict, AppError> {
        let signature = params
            .get("signature")
            .ok_or_else(|| AppError::SignatureInvalid("missing signature".to_string()))?;

        let raw = self.ipn_raw_signature(params);
        self.verify(&raw, signature)?;

        let transaction_id = params
            .get("orderId")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| AppError::Validation("missing or malformed orderId".to_string()))?;

        let success = params.get("resultCode").map(String::as_str) == Some(SUCCESS_RESULT_CODE);

        Ok(CallbackVerdict {
            transaction_id,
            provider_tx_id: params.get("transId").cloned(),
            success,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn adapter_with_endpoint(endpoint: String) -> MomoAdapter {
        MomoAdapter::new(MomoConfig {
            partner_code: "MOMOTEST".to_string(),
            access_key: "test_access_key".to_string(),
            secret_key: "test_secret_key".to_string(),
            endpoint,
            redirect_url: "https://example.com/payments/momo/return".to_string(),
            ipn_url: "https://example.com/payments/momo/callback".to_string(),
        })
    }

    fn adapter() -> MomoAdapter {
        adapter_with_endpoint("https://test-payment.momo.vn/v2/gateway/api/create".to_string())
    }

    fn signed_ipn(adapter: &MomoAdapter, tx_id: Uuid, result_code: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("partnerCode".to_string(), "MOMOTEST".to_string());
        params.insert("orderId".to_string(), tx_id.to_string());
        params.insert("requestId".to_string(), Uuid::new_v4().to_string());
        params.insert("amount".to_string(), "99000".to_string());
        params.insert("orderInfo".to_string(), "30-day VIP".to_string());
        params.insert("orderType".to_string(), "momo_wallet".to_string());
        params.insert("transId".to_string(), "2147483647".to_string());
        params.insert("resultCode".to_string(), result_code.to_string());
        params.insert("message".to_string(), "Success".to_string());
        params.insert("payType".to_string(), "qr".to_string());
        params.insert("responseTime".to_string(), "1700000000000".to_string());
        params.insert("extraData".to_string(), "".to_string());

        let signature = adapter.sign(&adapter.ipn_raw_signature(&params));
        params.insert("signature".to_string(), signature);
        params
    }

    #[test]
    fn valid_ipn_verifies_and_maps_success() {
        let adapter = adapter();
        let tx_id = Uuid::new_v4();
        let params = signed_ipn(&adapter, tx_id, "0");

        let verdict = adapter.verify_callback(&params).unwrap();
        assert!(verdict.success);
        assert_eq!(verdict.transaction_id, tx_id);
        assert_eq!(verdict.provider_tx_id.as_deref(), Some("2147483647"));
    }

    #[test]
    fn failure_result_code_maps_to_unsuccessful() {
        let adapter = adapter();
        let params = signed_ipn(&adapter, Uuid::new_v4(), "1006");

        let verdict = adapter.verify_callback(&params).unwrap();
        assert!(!verdict.success);
    }

    #[test]
    fn tampered_amount_is_rejected_hard() {
        let adapter = adapter();
        let mut params = signed_ipn(&adapter, Uuid::new_v4(), "0");
        params.insert("amount".to_string(), "1".to_string());

        let result = adapter.verify_callback(&params);
        assert!(matches!(result, Err(AppError::SignatureInvalid(_))));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let adapter = adapter();
        let mut params = signed_ipn(&adapter, Uuid::new_v4(), "0");
        params.remove("signature");

        let result = adapter.verify_callback(&params);
        assert!(matches!(result, Err(AppError::SignatureInvalid(_))));
    }

    #[tokio::test]
    async fn create_payment_request_returns_pay_url() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"resultCode": 0, "message": "Success", "payUrl": "https://test-payment.momo.vn/pay/abc"}"#)
            .create_async()
            .await;

        let adapter = adapter_with_endpoint(server.url());
        let order = PaymentOrder {
            transaction_id: Uuid::new_v4(),
            amount: BigDecimal::from(99000),
            description: "30-day VIP".to_string(),
            client_ip: None,
        };

        let redirect = adapter.create_payment_request(&order).await.unwrap();
        assert_eq!(redirect, "https://test-payment.momo.vn/pay/abc");
    }

    #[tokio::test]
    async fn create_payment_request_surfaces_gateway_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"resultCode": 41, "message": "Duplicate orderId", "payUrl": null}"#)
            .create_async()
            .await;

        let adapter = adapter_with_endpoint(server.url());
        let order = PaymentOrder {
            transaction_id: Uuid::new_v4(),
            amount: BigDecimal::from(99000),
            description: "30-day VIP".to_string(),
            client_ip: None,
        };

        let result = adapter.create_payment_request(&order).await;
        assert!(matches!(result, Err(AppError::Gateway(_))));
    }
}
