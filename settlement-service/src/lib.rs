pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use config::Config;
use services::{ExchangeRateClient, MongoLedgerStore, SettlementEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: SettlementEngine,
}

pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret())
            .await
            .map_err(|e| {
                tracing::error!("Failed to parse MongoDB connection string: {}", e);
                AppError::DatabaseError(e.into())
            })?;
        client_options.app_name = Some("settlement-service".to_string());

        let client = Client::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(e.into())
        })?;
        let db = client.database(&config.database.db_name);

        let store = MongoLedgerStore::new(&db);

        // Initialize indexes for company-scoped queries
        store.init_indexes().await?;

        let exchange = ExchangeRateClient::new(config.exchange.clone())?;
        let engine = SettlementEngine::new(Arc::new(store), Arc::new(exchange));

        let state = AppState {
            config: config.clone(),
            engine,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            // Invoice endpoints (company-scoped)
            .route("/invoices", post(handlers::invoices::create_invoice))
            .route("/invoices/:invoice_id", get(handlers::invoices::get_invoice))
            .route(
                "/invoices/:invoice_id/send",
                post(handlers::invoices::send_invoice),
            )
            // Settlement endpoints
            .route(
                "/invoices/:invoice_id/payments",
                post(handlers::payments::record_payment).get(handlers::payments::list_payments),
            )
            .route(
                "/invoices/:invoice_id/payments/:payment_id",
                delete(handlers::payments::delete_payment),
            )
            // Reporting
            .route("/reports/totals", get(handlers::reports::company_totals))
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        Ok(Self {
            port: config.server.port,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
