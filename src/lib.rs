pub mod cli;
pub mod config;
pub mod coordination;
pub mod db;
pub mod error;
pub mod handlers;
pub mod providers;
pub mod services;
pub mod startup;

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::coordination::{BalanceCache, DistributedLock, IdempotencyGuard, RateCounter};
use crate::providers::ProviderRegistry;
use crate::services::{
    FraudHeuristic, PaymentService, ReconciliationService, TransactionIntegrityService,
    WalletService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub providers: Arc<ProviderRegistry>,
    pub payments: PaymentService,
    pub wallet: WalletService,
    pub integrity: TransactionIntegrityService,
    pub reconciliation: ReconciliationService,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, redis: redis::Client, config: Config) -> Self {
        let lock = DistributedLock::new(redis.clone());
        let guard = IdempotencyGuard::new(redis.clone());
        let cache = BalanceCache::new(redis.clone());
        let counter = RateCounter::new(redis);

        let providers = Arc::new(ProviderRegistry::new(&config));
        let fraud = FraudHeuristic::new(
            counter,
            config.fraud_max_amount,
            config.fraud_max_payments_per_hour,
        );

        let payments = PaymentService::new(db.clone(), fraud, providers.clone());
        let wallet = WalletService::new(db.clone(), lock.clone(), cache.clone());
        let integrity = TransactionIntegrityService::new(db.clone(), lock, guard, cache);
        let reconciliation = ReconciliationService::new(db.clone());

        Self {
            db,
            config,
            providers,
            payments,
            wallet,
            integrity,
            reconciliation,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = match &state.config.cors_allowed_origins {
        Some(origins) => {
            let list: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(list)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(handlers::openapi))
        .route("/payments", post(handlers::payments::create_payment))
        .route("/payments/vnpay/callback", get(handlers::webhook::vnpay_callback))
        .route("/payments/momo/callback", post(handlers::webhook::momo_callback))
        .route("/transactions/:id", get(handlers::payments::get_transaction))
        .route("/users/:id/wallet", get(handlers::wallet::get_wallet))
        .route("/users/:id/wallet/spend", post(handlers::wallet::spend))
        .route("/users/:id/wallet/credit", post(handlers::wallet::credit))
        .route(
            "/users/:id/transactions",
            get(handlers::payments::list_user_transactions),
        )
        .layer(cors)
        .with_state(state)
}
