//! Provider webhook endpoints.
//!
//! Signature verification happens here, before the integrity service is
//! invoked, so a rejected callback never touches the idempotency guard and a
//! legitimately-signed retry can still succeed. A transaction already in a
//! terminal state acks as success so the provider stops retrying.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::AppState;
use crate::db::models::Provider;
use crate::error::AppError;
use crate::providers::ProviderAdapter;

/// VNPay-style IPN: query-string parameters, acked with an RspCode envelope.
pub async fn vnpay_callback(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Response {
    let adapter = match state.providers.get(Provider::Vnpay) {
        Ok(adapter) => adapter,
        Err(e) => return e.into_response(),
    };

    let verdict = match adapter.verify_callback(&params) {
        Ok(verdict) => verdict,
        Err(AppError::SignatureInvalid(reason)) => {
            tracing::warn!(
                order_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or("?"),
                response_code = params.get("vnp_ResponseCode").map(String::as_str).unwrap_or("?"),
                reason = %reason,
                "rejected callback with invalid signature"
            );
            return vnpay_ack("97", "Invalid signature");
        }
        Err(AppError::Validation(_)) => return vnpay_ack("01", "Order not found"),
        Err(e) => {
            tracing::error!(error = %e, "callback verification error");
            return vnpay_ack("99", "Unknown error");
        }
    };

    match state.integrity.complete_payment(&verdict).await {
        Ok(_) => vnpay_ack("00", "Confirm success"),
        Err(AppError::NotFound(_)) => vnpay_ack("01", "Order not found"),
        Err(e) => {
            // Includes ResourceBusy: a generic failure ack makes the provider
            // retry, which is safe behind the idempotency guard.
            tracing::error!(tx = %verdict.transaction_id, error = %e, "callback completion failed");
            vnpay_ack("99", "Unknown error")
        }
    }
}

fn vnpay_ack(code: &str, message: &str) -> Response {
    Json(json!({ "RspCode": code, "Message": message })).into_response()
}

/// MoMo-style IPN: JSON body, acked with 204 No Content.
pub async fn momo_callback(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, AppError> {
    let params = flatten_params(&payload)
        .ok_or_else(|| AppError::Validation("callback body must be a JSON object".to_string()))?;

    let adapter = state.providers.get(Provider::Momo)?;
    let verdict = adapter.verify_callback(&params).map_err(|e| {
        if let AppError::SignatureInvalid(ref reason) = e {
            tracing::warn!(
                order_ref = params.get("orderId").map(String::as_str).unwrap_or("?"),
                result_code = params.get("resultCode").map(String::as_str).unwrap_or("?"),
                reason = %reason,
                "rejected callback with invalid signature"
            );
        }
        e
    })?;

    state.integrity.complete_payment(&verdict).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Callback JSON carries numbers unquoted; signatures are computed over their
/// plain decimal rendering.
fn flatten_params(payload: &Value) -> Option<BTreeMap<String, String>> {
    let object = payload.as_object()?;
    let mut params = BTreeMap::new();
    for (key, value) in object {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            _ => continue,
        };
        params.insert(key.clone(), rendered);
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_renders_numbers_without_quotes() {
        let payload = json!({
            "orderId": "abc",
            "amount": 99000,
            "resultCode": 0,
            "extraData": "",
        });

        let params = flatten_params(&payload).unwrap();
        assert_eq!(params.get("amount").unwrap(), "99000");
        assert_eq!(params.get("resultCode").unwrap(), "0");
        assert_eq!(params.get("extraData").unwrap(), "");
    }

    #[test]
    fn flatten_rejects_non_objects() {
        assert!(flatten_params(&json!([1, 2, 3])).is_none());
        assert!(flatten_params(&json!("plain")).is_none());
    }
}
