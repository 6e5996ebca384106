//! Welcome endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

/// GET /
pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the DataSaarthi API".to_string(),
    })
}

pub fn root_routes() -> Router<AppState> {
    Router::new().route("/", get(welcome))
}
