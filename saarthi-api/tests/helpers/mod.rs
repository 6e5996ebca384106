//! Test Helper Utilities
//!
//! Shared utilities for testing saarthi-api: an app rooted in a temp dir
//! with the local publisher and a counting stub renderer, plus request and
//! response helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use saarthi_api::models::AssetKind;
use saarthi_api::services::charts::{ChartRenderer, RenderError};
use saarthi_api::services::publisher::{
    AssetPublisher, LocalPublisher, PublishError, UnpublishOutcome,
};
use saarthi_api::services::table::Table;
use saarthi_api::{build_router, AppState};
use saarthi_common::config::Settings;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "saarthi-test-boundary";

/// Renderer that writes placeholder bytes and counts calls
#[derive(Default)]
pub struct StubRenderer {
    calls: AtomicUsize,
}

impl StubRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChartRenderer for StubRenderer {
    fn render(&self, _kind: AssetKind, _table: &Table, out: &Path) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, b"\x89PNG stub")?;
        Ok(())
    }
}

/// Publisher whose image host always rejects uploads
pub struct RejectingPublisher;

#[async_trait]
impl AssetPublisher for RejectingPublisher {
    async fn publish(&self, _local_path: &Path, _logical_id: &str) -> Result<String, PublishError> {
        Err(PublishError::Api(401, "Invalid Signature".to_string()))
    }

    async fn unpublish(&self, _url: &str) -> UnpublishOutcome {
        UnpublishOutcome::Failed("rejected".to_string())
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}

/// Router plus everything a test may want to inspect
pub struct TestApp {
    pub dir: TempDir,
    pub settings: Settings,
    pub state: AppState,
    pub renderer: Arc<StubRenderer>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    pub fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        Self::build(adjust, |settings| {
            Arc::new(LocalPublisher::new(
                settings.published_dir.clone(),
                settings.public_base_url.clone(),
            ))
        })
    }

    pub fn with_publisher(publisher: Arc<dyn AssetPublisher>) -> Self {
        Self::build(|_| {}, move |_| publisher)
    }

    fn build(
        adjust: impl FnOnce(&mut Settings),
        make_publisher: impl FnOnce(&Settings) -> Arc<dyn AssetPublisher>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::with_storage_root(dir.path());
        adjust(&mut settings);

        let renderer = Arc::new(StubRenderer::default());
        let publisher = make_publisher(&settings);
        let state = AppState::new(&settings, renderer.clone(), publisher);
        let router = build_router(state.clone());

        Self {
            dir,
            settings,
            state,
            renderer,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Upload `contents` and return the issued file_id
    pub async fn upload(&self, file_name: &str, contents: &str) -> String {
        let response = self.send(upload_request(file_name, contents)).await;
        assert_eq!(response.status(), 200, "upload should succeed");
        let json = extract_json(response).await;
        json["file_id"].as_str().unwrap().to_string()
    }
}

/// multipart/form-data request carrying one `file` field
pub fn upload_request(file_name: &str, contents: &str) -> Request<Body> {
    multipart_request("file", file_name, contents)
}

pub fn multipart_request(field: &str, file_name: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/csv\r\n\r\n{contents}\r\n--{b}--\r\n",
        b = BOUNDARY,
    );

    Request::builder()
        .method("POST")
        .uri("/uploadfile/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn extract_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = extract_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}
