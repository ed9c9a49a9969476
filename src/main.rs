mod bureau_client;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod orchestrator;
mod report;
mod state_machine;
mod store;
mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bureau_client::HttpBureauClient;
use crate::config::Config;
use crate::db::Database;
use crate::orchestrator::Orchestrator;
use crate::store::PgConsultationStore;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, the bureau client
/// and the HTTP routes, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_buro_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Bureau client is an explicit dependency of the orchestrator so tests
    // can swap in a double; no process-wide singleton.
    let bureau_client = HttpBureauClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize bureau client: {}", e))?;
    tracing::info!("Bureau API client initialized");

    let store = PgConsultationStore::new(db.pool.clone());
    let orchestrator = Orchestrator::new(store, bureau_client);

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        orchestrator,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/consultations", post(handlers::submit_consultation))
        .route("/api/v1/consultations", get(handlers::list_history))
        .route("/api/v1/consultations/:id", get(handlers::get_consultation))
        .route(
            "/api/v1/consultations/:id/authenticate",
            post(handlers::authenticate_consultation),
        )
        .route(
            "/api/v1/consultations/:id/report",
            post(handlers::fetch_report),
        )
        .route(
            "/api/v1/consultations/:id/pdf",
            get(handlers::download_report),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
