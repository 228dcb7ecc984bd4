//! Rental Inventory Platform - Backend Server

use std::sync::Arc;

use rental_backend::config::{Config, LogFormat, StoreBackend};
use rental_backend::store::{MemorySequenceStore, PgSequenceStore, SequenceStore};
use rental_backend::{create_app, AppState, IdManagerService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "rental_server=debug,rental_backend=debug,tower_http=debug,sqlx=warn".into()
    });
    match config.log.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Starting Rental Inventory Server");
    tracing::info!("Environment: {}", config.environment);

    let store: Arc<dyn SequenceStore> = match config.database.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let store = PgSequenceStore::connect(&config.database).await?;
            tracing::info!("Database connection established");

            if config.database.run_migrations {
                tracing::info!("Running database migrations...");
                store.migrate().await?;
                tracing::info!("Migrations completed");
            }
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory sequence store; IDs are not durable");
            Arc::new(MemorySequenceStore::new())
        }
    };

    // Create application state
    let state = AppState {
        id_manager: IdManagerService::new(store, config.id_manager.clone()),
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr = config.bind_address();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
