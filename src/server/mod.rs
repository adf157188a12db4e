use crate::avatar::{AssetStorage, AvatarCoordinator, FileSystemStorage};
use crate::config::Config;
use crate::profiles::ProfileStore;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use clopetracker_db::pool::DbPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};

pub mod error;
pub mod routes_profiles;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Profile persistence with the avatar hooks registered
    pub store: ProfileStore,
    pub storage: Arc<dyn AssetStorage>,
}

impl AppContext {
    /// Wire filesystem storage and the avatar coordinator into a profile store.
    pub fn new(config: Config, db_pool: DbPool) -> Self {
        let storage: Arc<dyn AssetStorage> = Arc::new(FileSystemStorage::new(
            config.storage.media_root.clone(),
            config.storage.media_url.clone(),
        ));
        let coordinator = AvatarCoordinator::from_config(&config.avatar, storage.clone());
        let store = ProfileStore::new(db_pool).with_hook(Arc::new(coordinator));

        Self {
            config: Arc::new(config),
            store,
            storage,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let config = ctx.config.clone();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes_profiles::profile_routes());

    // Only a path-style media URL is ours to serve; anything else is a CDN.
    let media_path = config.storage.media_url.trim_end_matches('/');
    if media_path.starts_with('/') && !media_path.is_empty() {
        tracing::info!(
            "Serving media from {:?} at {}",
            config.storage.media_root,
            media_path
        );
        // Uploads are stored with client-declared types when they fail to
        // decode, so browsers must not sniff them into something else.
        let media = ServiceBuilder::new()
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .service(ServeDir::new(&config.storage.media_root));
        app = app.nest_service(media_path, media);
    }

    if let Some(dir) = &config.server.static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            app = app.nest_service("/static", ServeDir::new(dir));
        } else {
            tracing::warn!("Static directory {:?} does not exist", dir);
        }
    }

    app.layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config, db_pool: DbPool) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    std::fs::create_dir_all(&config.storage.media_root).with_context(|| {
        format!(
            "Failed to create media root {:?}",
            config.storage.media_root
        )
    })?;

    let app = create_router(AppContext::new(config, db_pool));

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
