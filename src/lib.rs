pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod directory;
pub mod error;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::cache::SeatCache;
use crate::directory::{Directory, PgDirectory};
use crate::error::AppResult;
use crate::services::{BookingEngine, Ledger, PaymentCoordinator, PaymentGateway, TripService};
use crate::store::{PgTripStore, TripStore};

// Shared state for every handler
pub struct AppState {
    pub config: config::Config,
    pub directory: Arc<dyn Directory>,
    pub trips: TripService,
    pub bookings: BookingEngine,
    pub payments: PaymentCoordinator,
}

impl AppState {
    /// Connects the database, the optional seat cache and the configured
    /// payment gateway, then restores the booking state from the database.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database)
            .await
            .context("failed to connect to database")?;
        info!("Database connected");
        db.run_migrations().await.context("failed to run migrations")?;

        let cache = match &config.redis.url {
            Some(url) => {
                let redis = redis_client::RedisClient::new(url)
                    .await
                    .context("failed to connect to Redis")?;
                info!("Redis connected, seat cache enabled");
                Some(Arc::new(cache::CacheService::new(redis)) as Arc<dyn SeatCache>)
            }
            None => None,
        };

        let gateway = services::gateway::from_config(&config.payment, &config.circuit_breaker)
            .context("failed to build payment gateway")?;
        info!(mode = ?config.payment.mode, "Payment gateway ready");

        let directory = Arc::new(PgDirectory::new(db.clone()));
        let store = Arc::new(PgTripStore::new(db));
        let state = Self::with_parts(config, directory, store, gateway, cache)
            .await
            .context("failed to restore booking state")?;
        Ok(Arc::new(state))
    }

    /// Wires the services around an existing directory, store and gateway,
    /// rebuilding the ledger from whatever the store holds.
    pub async fn with_parts(
        config: config::Config,
        directory: Arc<dyn Directory>,
        store: Arc<dyn TripStore>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Option<Arc<dyn SeatCache>>,
    ) -> AppResult<Self> {
        let ledger = Arc::new(Ledger::restore(store, cache).await?);
        let settings = services::PaymentSettings::from(&config.payment);

        let payments = PaymentCoordinator::new(ledger.clone(), gateway, settings);
        let interrupted = payments.fail_interrupted().await?;
        if interrupted > 0 {
            info!(interrupted, "Failed payments interrupted by the last shutdown");
        }

        Ok(Self {
            trips: TripService::new(ledger.clone(), directory.clone()),
            bookings: BookingEngine::new(ledger, directory.clone()),
            payments,
            directory,
            config,
        })
    }
}

/// Full HTTP application: `/health` plus the `/api` routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
