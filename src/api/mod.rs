use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use axum_macros::FromRef;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::filter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
pub use error::{ApiError, ErrorBody};
pub use auth::{expired_session_cookie, session_cookie, AdminSession, SessionStore, SESSION_COOKIE};
pub use counters::StatisticsBuffer;
use crate::assets::AssetStore;
use crate::client::CatalogClient;
use crate::config::{AppConfig, ServerConfig};
use crate::error::CatalogError;
use crate::storage::FileStorage;
use crate::web_ui;

mod error;
mod auth;
mod counters;
pub(crate) mod controllers;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

pub type Catalog = CatalogClient<FileStorage>;

const STATISTICS_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, FromRef)]
pub struct ApiContext {
    pub cfg: Arc<ServerConfig>,
    pub db: Arc<RwLock<Catalog>>,
    pub assets: AssetStore,
    pub sessions: SessionStore,
    pub statistics: StatisticsBuffer,
}

impl ApiContext {
    /// Opens the document log and replays it. Done once at start-up; the
    /// connected client is shared by every request.
    pub async fn connect(app_config: &AppConfig, server_config: ServerConfig) -> Result<Self, CatalogError> {
        let mut client = CatalogClient::new(FileStorage::new(app_config.db_path.clone()));
        client.connect().await?;
        let sessions = SessionStore::new(server_config.session_ttl);
        Ok(Self {
            cfg: Arc::new(server_config),
            db: Arc::new(RwLock::new(client)),
            assets: AssetStore::new(app_config.content_root.clone()),
            sessions,
            statistics: StatisticsBuffer::default(),
        })
    }
}

pub fn init_tracing() {
    let tracing_layer = tracing_subscriber::fmt::layer();
    let filter = filter::Targets::new()
        .with_target("tower_http::trace::on_response", Level::DEBUG)
        .with_target("tower_http::trace::make_span", Level::DEBUG)
        .with_target("stylepins", Level::DEBUG)
        .with_default(Level::INFO);
    tracing_subscriber::registry()
        .with(tracing_layer)
        .with(filter)
        .init();
}

pub fn router(ctx: ApiContext) -> Router {
    let uploads = ServeDir::new(ctx.assets.uploads_dir());
    let max_upload_bytes = ctx.cfg.max_upload_bytes;
    controllers::router()
        .merge(web_ui::router())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::new().allow_methods(Any).allow_headers(Any).allow_origin(Any))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(ctx)
}

pub async fn serve(app_config: AppConfig, server_config: ServerConfig) -> anyhow::Result<()> {
    info!("{:?}", &server_config);
    let bind_addr = server_config.bind_addr.clone();
    let ctx = ApiContext::connect(&app_config, server_config).await
        .context("failed to connect to the catalog DB")?;

    let flusher = tokio::spawn(flush_statistics_periodically(ctx.clone()));
    let app = router(ctx.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;
    info!("listening on {}", &bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("error running HTTP server")?;

    flusher.abort();
    controllers::statistics::flush(&ctx).await.context("failed to store statistics on shutdown")?;
    info!("server stopped");
    Ok(())
}

async fn flush_statistics_periodically(ctx: ApiContext) {
    let mut interval = tokio::time::interval(STATISTICS_FLUSH_INTERVAL);
    loop {
        interval.tick().await;
        controllers::statistics::flush_or_warn(&ctx).await;
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = ?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
