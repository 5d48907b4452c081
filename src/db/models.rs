use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle of a transaction. PENDING transitions to exactly one of the
/// terminal states and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    PurchaseGold,
    PurchaseVip,
    SpendGold,
    AdminAdjust,
    CheckinReward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_provider", rename_all = "UPPERCASE")]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Vnpay,
    Momo,
    Internal,
}

/// Effect applied to the user's wallet when the transaction completes.
/// Parsed once at creation time and stored in this normalized shape, so
/// completion never re-interprets a free-form payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "effect", content = "value", rename_all = "snake_case")]
pub enum RewardEffect {
    GoldCredit(i64),
    VipExtension(i64),
    None,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Doubles as the provider-facing order reference.
    pub id: Uuid,
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    /// Money charged to the user; zero for internal gold operations.
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    /// Signed gold delta recorded for history (VIP days live in `notes`).
    pub reward_value: i64,
    pub status: TransactionStatus,
    pub provider: Provider,
    pub provider_tx_id: Option<String>,
    pub description: String,
    pub reference_id: Option<String>,
    #[schema(value_type = Object)]
    pub notes: Json<RewardEffect>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        tx_type: TransactionType,
        amount: BigDecimal,
        provider: Provider,
        reward: RewardEffect,
        description: String,
        reference_id: Option<String>,
    ) -> Self {
        let reward_value = match reward {
            RewardEffect::GoldCredit(gold) => gold,
            RewardEffect::VipExtension(_) | RewardEffect::None => 0,
        };
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx_type,
            amount,
            reward_value,
            status: TransactionStatus::Pending,
            provider,
            provider_tx_id: None,
            description,
            reference_id,
            notes: Json(reward),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Internally-settled ledger row: no money charged, no provider leg, and
    /// already terminal because the balance change commits in the same atomic
    /// block that inserts it.
    pub fn completed_internal(
        user_id: Uuid,
        tx_type: TransactionType,
        reward_value: i64,
        description: String,
        reference_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            tx_type,
            amount: BigDecimal::from(0),
            reward_value,
            status: TransactionStatus::Completed,
            provider: Provider::Internal,
            provider_tx_id: None,
            description,
            reference_id,
            notes: Json(RewardEffect::None),
            created_at: now,
            processed_at: Some(now),
        }
    }

    pub fn reward(&self) -> RewardEffect {
        self.notes.0
    }
}

/// Wallet-relevant subset of the user entity. Written only by the wallet
/// and integrity services.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct UserWallet {
    pub id: Uuid,
    pub gold_balance: i64,
    pub vip_tier: i32,
    pub vip_expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_starts_pending() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            TransactionType::PurchaseGold,
            BigDecimal::from(50000),
            Provider::Vnpay,
            RewardEffect::GoldCredit(50),
            "50 gold pack".to_string(),
            None,
        );

        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(!tx.status.is_terminal());
        assert_eq!(tx.reward_value, 50);
        assert!(tx.provider_tx_id.is_none());
        assert!(tx.processed_at.is_none());
    }

    #[test]
    fn vip_purchase_has_zero_reward_value() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            TransactionType::PurchaseVip,
            BigDecimal::from(99000),
            Provider::Momo,
            RewardEffect::VipExtension(30),
            "30-day VIP".to_string(),
            None,
        );

        assert_eq!(tx.reward_value, 0);
        assert_eq!(tx.reward(), RewardEffect::VipExtension(30));
    }

    #[test]
    fn terminal_states() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }

    #[test]
    fn reward_effect_round_trips_as_tagged_json() {
        let gold = serde_json::to_value(RewardEffect::GoldCredit(100)).unwrap();
        assert_eq!(gold, serde_json::json!({"effect": "gold_credit", "value": 100}));

        let parsed: RewardEffect =
            serde_json::from_value(serde_json::json!({"effect": "vip_extension", "value": 7}))
                .unwrap();
        assert_eq!(parsed, RewardEffect::VipExtension(7));

        let none: RewardEffect =
            serde_json::from_value(serde_json::json!({"effect": "none"})).unwrap();
        assert_eq!(none, RewardEffect::None);
    }
}
