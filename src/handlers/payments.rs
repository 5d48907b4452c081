use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppState;
use crate::db::models::{Provider, RewardEffect, Transaction, TransactionType};
use crate::db::queries;
use crate::error::AppError;
use crate::services::payment::NewPayment;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub provider: Provider,
    pub reward: RewardEffect,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentResponse {
    pub transaction_id: Uuid,
    pub redirect_url: String,
}

#[utoipa::path(
    post,
    path = "/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = CreatePaymentResponse),
        (status = 400, description = "Invalid payment request"),
        (status = 404, description = "User not found")
    ),
    tag = "Payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = state
        .payments
        .create_payment(NewPayment {
            user_id: payload.user_id,
            tx_type: payload.tx_type,
            amount: payload.amount,
            provider: payload.provider,
            reward: payload.reward,
            description: payload.description,
            client_ip: None,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            transaction_id: created.transaction_id,
            redirect_url: created.redirect_url,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/transactions/{id}",
    responses(
        (status = 200, description = "Transaction found", body = Transaction),
        (status = 404, description = "Transaction not found")
    ),
    tag = "Payments"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let tx = queries::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {}", id)))?;

    Ok(Json(tx))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/users/{id}/transactions",
    responses(
        (status = 200, description = "Transaction history, newest first", body = [Transaction])
    ),
    tag = "Payments"
)]
pub async fn list_user_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let limit = pagination.limit.unwrap_or(50).clamp(1, 200);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let transactions = queries::list_user_transactions(&state.db, user_id, limit, offset).await?;
    Ok(Json(transactions))
}
