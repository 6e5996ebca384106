//! saarthi-api library interface
//!
//! Exposes the router and services for the binary and for integration tests.

pub mod api;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use saarthi_common::config::{ResolvedPublisher, Settings};

use crate::services::{
    publisher, AnalysisEngine, AssetPublisher, ChartRenderer, PlottersRenderer, PublishError,
    SessionStore, TeardownManager, UploadManager,
};

/// Multipart framing allowance on top of the file size limit
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub uploads: Arc<UploadManager>,
    pub engine: Arc<AnalysisEngine>,
    pub teardown: Arc<TeardownManager>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last analysis failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
    pub cors_origins: Vec<String>,
    /// Directory served under /assets; set when charts are published locally
    pub assets_dir: Option<PathBuf>,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        renderer: Arc<dyn ChartRenderer>,
        publisher: Arc<dyn AssetPublisher>,
    ) -> Self {
        let store = SessionStore::new(settings.registry_file.clone());

        let uploads = UploadManager::new(
            store.clone(),
            settings.uploads_dir.clone(),
            settings.max_upload_bytes,
        );
        let engine = AnalysisEngine::new(
            store.clone(),
            renderer,
            Arc::clone(&publisher),
            settings.preview_rows,
            settings.publish_timeout,
        );
        let teardown = TeardownManager::new(store.clone(), publisher);

        let assets_dir = match settings.publisher {
            ResolvedPublisher::Local => Some(settings.published_dir.clone()),
            ResolvedPublisher::Cloudinary(_) => None,
        };

        Self {
            store,
            uploads: Arc::new(uploads),
            engine: Arc::new(engine),
            teardown: Arc::new(teardown),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
            cors_origins: settings.cors_origins.clone(),
            assets_dir,
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    /// State with the plotters renderer and the configured publisher
    pub fn from_settings(settings: &Settings) -> Result<Self, PublishError> {
        let asset_publisher = publisher::from_settings(settings)?;
        Ok(Self::new(
            settings,
            Arc::new(PlottersRenderer::new()),
            asset_publisher,
        ))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);
    let assets_dir = state.assets_dir.clone();

    let mut router = Router::new()
        .merge(api::root_routes())
        .merge(api::health_routes())
        .merge(api::upload_routes())
        .merge(api::analysis_routes())
        .merge(api::session_routes());

    if let Some(dir) = assets_dir {
        router = router.nest_service("/assets", ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
