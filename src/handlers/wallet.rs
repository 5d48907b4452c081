use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::{Transaction, TransactionType, UserWallet};
use crate::error::AppError;

#[utoipa::path(
    get,
    path = "/users/{id}/wallet",
    responses(
        (status = 200, description = "Wallet snapshot", body = UserWallet),
        (status = 404, description = "User not found")
    ),
    tag = "Wallet"
)]
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserWallet>, AppError> {
    let wallet = state.wallet.get_balance(user_id).await?;
    Ok(Json(wallet))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpendRequest {
    pub amount: i64,
    pub description: String,
    /// Caller-side reference, e.g. the unlocked episode id.
    pub reference_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SpendResponse {
    pub new_balance: i64,
    pub transaction: Transaction,
}

#[utoipa::path(
    post,
    path = "/users/{id}/wallet/spend",
    request_body = SpendRequest,
    responses(
        (status = 200, description = "Gold spent", body = SpendResponse),
        (status = 402, description = "Insufficient balance"),
        (status = 429, description = "Wallet busy, retry with backoff")
    ),
    tag = "Wallet"
)]
pub async fn spend(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SpendRequest>,
) -> Result<Json<SpendResponse>, AppError> {
    let outcome = state
        .wallet
        .spend(
            user_id,
            payload.amount,
            &payload.description,
            payload.reference_id.as_deref(),
        )
        .await?;

    Ok(Json(SpendResponse {
        new_balance: outcome.new_balance,
        transaction: outcome.transaction,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreditRequest {
    pub amount: i64,
    pub tx_type: TransactionType,
    pub description: String,
    pub reference_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreditResponse {
    pub new_balance: i64,
    pub transaction: Transaction,
}

#[utoipa::path(
    post,
    path = "/users/{id}/wallet/credit",
    request_body = CreditRequest,
    responses(
        (status = 201, description = "Gold credited", body = CreditResponse),
        (status = 400, description = "Invalid credit request"),
        (status = 429, description = "Wallet busy, retry with backoff")
    ),
    tag = "Wallet"
)]
pub async fn credit(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<CreditRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !matches!(
        payload.tx_type,
        TransactionType::AdminAdjust | TransactionType::CheckinReward
    ) {
        return Err(AppError::Validation(format!(
            "transaction type {:?} cannot be credited directly",
            payload.tx_type
        )));
    }

    let outcome = state
        .wallet
        .credit(
            user_id,
            payload.amount,
            payload.tx_type,
            &payload.description,
            payload.reference_id.as_deref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreditResponse {
            new_balance: outcome.new_balance,
            transaction: outcome.transaction,
        }),
    ))
}
