use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::coordination::RateCounter;

const VELOCITY_WINDOW_SECS: i64 = 3600;

/// Advisory verdict; flags are logged for investigation, never block the
/// payment.
#[derive(Debug, Clone)]
pub struct FraudAdvice {
    pub flagged: bool,
    pub reasons: Vec<String>,
}

/// Rate/amount anomaly check consulted before a payment is created. Counters
/// live in the shared store so the advice holds across workers.
#[derive(Clone)]
pub struct FraudHeuristic {
    counter: RateCounter,
    max_amount: i64,
    max_payments_per_hour: u64,
}

impl FraudHeuristic {
    pub fn new(counter: RateCounter, max_amount: i64, max_payments_per_hour: u64) -> Self {
        Self {
            counter,
            max_amount,
            max_payments_per_hour,
        }
    }

    pub async fn advise(&self, user_id: Uuid, amount: &BigDecimal) -> FraudAdvice {
        let window_count = match self
            .counter
            .incr(&format!("fraud:payments:{}", user_id), VELOCITY_WINDOW_SECS)
            .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                // Advisory check: degrade to "no advice" rather than block payments.
                tracing::warn!(user_id = %user_id, error = %e, "fraud counter unavailable");
                None
            }
        };

        let reasons = evaluate(amount, self.max_amount, window_count, self.max_payments_per_hour);
        if !reasons.is_empty() {
            tracing::warn!(
                user_id = %user_id,
                amount = %amount,
                reasons = ?reasons,
                "payment flagged by fraud heuristic"
            );
        }

        FraudAdvice {
            flagged: !reasons.is_empty(),
            reasons,
        }
    }
}

fn evaluate(
    amount: &BigDecimal,
    max_amount: i64,
    window_count: Option<i64>,
    max_payments_per_hour: u64,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if *amount > BigDecimal::from(max_amount) {
        reasons.push(format!("amount {} exceeds ceiling {}", amount, max_amount));
    }

    if let Some(count) = window_count {
        if count > max_payments_per_hour as i64 {
            reasons.push(format!(
                "{} payment attempts in the last hour (limit {})",
                count, max_payments_per_hour
            ));
        }
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unremarkable_payment_is_not_flagged() {
        let reasons = evaluate(&BigDecimal::from(50000), 20_000_000, Some(1), 10);
        assert!(reasons.is_empty());
    }

    #[test]
    fn oversized_amount_is_flagged() {
        let reasons = evaluate(&BigDecimal::from(25_000_000), 20_000_000, Some(1), 10);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("ceiling"));
    }

    #[test]
    fn velocity_over_limit_is_flagged() {
        let reasons = evaluate(&BigDecimal::from(50000), 20_000_000, Some(11), 10);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("limit 10"));
    }

    #[test]
    fn unavailable_counter_gives_no_velocity_advice() {
        let reasons = evaluate(&BigDecimal::from(50000), 20_000_000, None, 10);
        assert!(reasons.is_empty());
    }

    #[test]
    fn both_checks_can_flag_together() {
        let reasons = evaluate(&BigDecimal::from(25_000_000), 20_000_000, Some(20), 10);
        assert_eq!(reasons.len(), 2);
    }
}
