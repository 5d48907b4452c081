pub mod fraud;
pub mod integrity;
pub mod payment;
pub mod reconciliation;
pub mod wallet;

pub use fraud::{FraudAdvice, FraudHeuristic};
pub use integrity::{CompletionOutcome, TransactionIntegrityService};
pub use payment::{CreatedPayment, NewPayment, PaymentService};
pub use reconciliation::{ReconciliationService, SweepReport, run_sweeper};
pub use wallet::{CreditOutcome, SpendOutcome, WalletService};
