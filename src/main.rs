//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database and image storage
//! - Starts the HTTP server with graceful shutdown support

use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use art_catalog::access::StaticRoleDirectory;
use art_catalog::catalog::Catalog;
use art_catalog::config::Config;
use art_catalog::database::{init_db, AppState};
use art_catalog::error::Result;
use art_catalog::route::create_app;
use art_catalog::storage::{FallbackImageStorage, ImageStorage, LocalImageStorage};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "art_catalog=debug,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    let db = init_db(&config.database_url)?;

    let mut backends: Vec<Arc<dyn ImageStorage>> = vec![Arc::new(LocalImageStorage::new(
        &config.image_dir,
        &config.image_base_url,
    ))];
    if let Some(dir) = &config.image_fallback_dir {
        backends.push(Arc::new(LocalImageStorage::new(dir, &config.image_base_url)));
    }
    let images = Arc::new(FallbackImageStorage::new(backends));

    let state = AppState {
        catalog: Catalog::new(Arc::new(db), images).with_upload_timeout(config.upload_timeout),
        roles: Arc::new(StaticRoleDirectory::new(config.admin_ids.clone())),
        auth_secret: config.auth_secret.clone(),
    };

    let mut app = create_app(state);
    if config.image_base_url.starts_with('/') {
        let images = ServeDir::new(&config.image_dir);
        app = match &config.image_fallback_dir {
            Some(dir) => app.nest_service(&config.image_base_url, images.fallback(ServeDir::new(dir))),
            None => app.nest_service(&config.image_base_url, images),
        };
    }
    let app = app.layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        art_catalog::error::AppError::Config(format!("cannot bind {addr}: {e}"))
    })?;

    tracing::info!(port = config.port, database = %config.database_url, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| art_catalog::error::AppError::Config(format!("server error: {e}")))?;
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// In-flight requests are allowed to finish and open write transactions are
/// committed or rolled back before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
