mod billing;
mod config;
mod db;
mod db_storage;
mod education;
mod education_sync;
mod errors;
mod handlers;
mod ledger;
mod models;
mod targeting;

use axum::{
    routing::{get, patch, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::db_storage::AccountStorage;
use crate::education_sync::EducationLevelSync;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection.
/// - The in-school account cache.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
///
/// # Returns
///
/// * `anyhow::Result<()>` - Ok if the server runs successfully, or an error if initialization fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edu_accounts_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let storage = Arc::new(AccountStorage::new(db.pool.clone()));
    let education_sync = Arc::new(EducationLevelSync::new(storage.clone()));

    // In-school account set cache: one entry, refreshed every minute.
    // Schooling-status targeting tolerates a minute of staleness.
    let in_school_cache = Cache::builder()
        .time_to_live(Duration::from_secs(60))
        .max_capacity(1)
        .build();
    tracing::info!("In-school account cache initialized");

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        db: db.pool.clone(),
        config: config.clone(),
        storage,
        education_sync,
        in_school_cache,
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
        // Accounts and ledger
        .route("/api/v1/accounts/:id", get(handlers::get_account))
        .route(
            "/api/v1/accounts/:id/ledger",
            get(handlers::get_account_ledger),
        )
        .route(
            "/api/v1/accounts/:id/closure-date",
            get(handlers::get_account_closure_date),
        )
        // Courses and enrollments
        .route(
            "/api/v1/courses/:id/proration",
            get(handlers::get_course_proration),
        )
        .route("/api/v1/enrollments", post(handlers::create_enrollment))
        .route(
            "/api/v1/enrollments/:id",
            patch(handlers::update_enrollment).delete(handlers::delete_enrollment),
        )
        // Top-ups
        .route(
            "/api/v1/top-ups",
            get(handlers::list_top_ups).post(handlers::create_top_up),
        )
        .route("/api/v1/top-ups/preview", post(handlers::preview_top_up))
        .route(
            "/api/v1/top-ups/:id/eligible",
            get(handlers::get_top_up_eligible),
        )
        .route("/api/v1/top-ups/:id/cancel", post(handlers::cancel_top_up))
        // Providers
        .route("/api/v1/providers", get(handlers::list_providers))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20 (prevents DDoS)
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
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
