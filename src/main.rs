use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gtactical_leads_api::config::Config;
use gtactical_leads_api::db::Database;
use gtactical_leads_api::dispatch_queue::{spawn_dispatch_worker, DispatchQueue};
use gtactical_leads_api::handlers::AppState;
use gtactical_leads_api::notify::NotificationDispatcher;
use gtactical_leads_api::routes::router_with_rate_limit;
use gtactical_leads_api::store::PgLeadStore;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Database connection and migrations.
/// - The notification queue and its worker.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gtactical_leads_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    if config.run_migrations {
        db.migrate().await?;
    }

    let store = Arc::new(PgLeadStore::new(db.pool.clone()));

    let dispatcher = Arc::new(
        NotificationDispatcher::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize e-mail client: {}", e))?,
    );
    tracing::info!("✓ E-mail client initialized: {}", config.resend_base_url);

    // Phase-two notifications run off the request path
    let (queue, rx) = DispatchQueue::new(config.dispatch_queue_capacity);
    let _worker = spawn_dispatch_worker(rx, dispatcher.clone());
    tracing::info!(
        "Dispatch queue initialized (capacity {})",
        config.dispatch_queue_capacity
    );

    // Build application state
    let app_state = Arc::new(AppState::new(&config, store, queue, dispatcher));
    let app = router_with_rate_limit(app_state)?;

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
