//! Cross-process coordination over the shared key-value store.
//!
//! No in-process state carries correctness-relevant counts or claims; every
//! primitive here is a single atomic Redis operation so the service can run
//! as any number of stateless workers.

pub mod cache;
pub mod counters;
pub mod idempotency;
pub mod lock;

pub use cache::BalanceCache;
pub use counters::RateCounter;
pub use idempotency::IdempotencyGuard;
pub use lock::DistributedLock;
