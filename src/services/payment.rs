use std::sync::Arc;

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Provider, RewardEffect, Transaction, TransactionType};
use crate::db::queries;
use crate::error::AppError;
use crate::providers::{PaymentOrder, ProviderAdapter, ProviderRegistry};
use crate::services::fraud::FraudHeuristic;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub amount: BigDecimal,
    pub provider: Provider,
    pub reward: RewardEffect,
    pub description: String,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub transaction_id: Uuid,
    pub redirect_url: String,
}

#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    fraud: FraudHeuristic,
    providers: Arc<ProviderRegistry>,
}

impl PaymentService {
    pub fn new(pool: PgPool, fraud: FraudHeuristic, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            pool,
            fraud,
            providers,
        }
    }

    /// Create a PENDING transaction and hand the client a gateway redirect.
    /// The reward payload is normalized here so completion applies it without
    /// re-interpretation. If the gateway call fails after the insert, the
    /// PENDING row is left for the reconciliation sweeper.
    pub async fn create_payment(&self, request: NewPayment) -> Result<CreatedPayment, AppError> {
        if request.amount <= BigDecimal::from(0) {
            return Err(AppError::Validation("payment amount must be positive".to_string()));
        }
        validate_reward(request.tx_type, request.reward)?;

        queries::get_wallet(&self.pool, request.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", request.user_id)))?;

        let advice = self.fraud.advise(request.user_id, &request.amount).await;
        if advice.flagged {
            // Advisory only: flagged payments proceed and are investigated
            // out of band.
            tracing::warn!(user_id = %request.user_id, reasons = ?advice.reasons, "proceeding with flagged payment");
        }

        let adapter = self.providers.get(request.provider)?;

        let record = Transaction::new(
            request.user_id,
            request.tx_type,
            request.amount.clone(),
            request.provider,
            request.reward,
            request.description.clone(),
            None,
        );
        let transaction = queries::insert_transaction(&self.pool, &record).await?;

        let order = PaymentOrder {
            transaction_id: transaction.id,
            amount: request.amount,
            description: request.description,
            client_ip: request.client_ip,
        };
        let redirect_url = adapter.create_payment_request(&order).await.map_err(|e| {
            tracing::warn!(tx = %transaction.id, error = %e, "gateway create failed; transaction left pending for sweep");
            e
        })?;

        tracing::info!(
            tx = %transaction.id,
            user_id = %transaction.user_id,
            provider = ?transaction.provider,
            amount = %transaction.amount,
            "payment created"
        );

        Ok(CreatedPayment {
            transaction_id: transaction.id,
            redirect_url,
        })
    }
}

/// Externally-paid transactions must carry a reward that matches their type.
fn validate_reward(tx_type: TransactionType, reward: RewardEffect) -> Result<(), AppError> {
    match (tx_type, reward) {
        (TransactionType::PurchaseGold, RewardEffect::GoldCredit(gold)) if gold > 0 => Ok(()),
        (TransactionType::PurchaseVip, RewardEffect::VipExtension(days)) if days > 0 => Ok(()),
        (TransactionType::PurchaseGold, _) => Err(AppError::Validation(
            "gold purchase requires a positive gold_credit reward".to_string(),
        )),
        (TransactionType::PurchaseVip, _) => Err(AppError::Validation(
            "VIP purchase requires a positive vip_extension reward".to_string(),
        )),
        _ => Err(AppError::Validation(format!(
            "transaction type {:?} cannot be paid through a gateway",
            tx_type
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gold_purchase_requires_gold_credit() {
        assert!(validate_reward(TransactionType::PurchaseGold, RewardEffect::GoldCredit(50)).is_ok());
        assert!(matches!(
            validate_reward(TransactionType::PurchaseGold, RewardEffect::VipExtension(30)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_reward(TransactionType::PurchaseGold, RewardEffect::GoldCredit(0)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn vip_purchase_requires_vip_extension() {
        assert!(validate_reward(TransactionType::PurchaseVip, RewardEffect::VipExtension(30)).is_ok());
        assert!(matches!(
            validate_reward(TransactionType::PurchaseVip, RewardEffect::None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_reward(TransactionType::PurchaseVip, RewardEffect::VipExtension(-1)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn internal_types_cannot_go_through_a_gateway() {
        assert!(matches!(
            validate_reward(TransactionType::SpendGold, RewardEffect::None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_reward(TransactionType::CheckinReward, RewardEffect::GoldCredit(5)),
            Err(AppError::Validation(_))
        ));
    }
}
