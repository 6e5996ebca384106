//! Session deletion
//!
//! DELETE /remove_file/{file_id}

use axum::{
    extract::{Path, State},
    routing::delete,
    Json, Router,
};
use serde::Serialize;

use crate::{api::require_session_id, error::ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub assets_unpublished: usize,
    pub assets_failed: usize,
}

/// DELETE /remove_file/{file_id}
pub async fn remove_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    require_session_id(&file_id)?;
    let report = state.teardown.delete_session(&file_id).await?;

    Ok(Json(DeleteResponse {
        message: format!("File {} and associated assets deleted", file_id),
        assets_unpublished: report.assets_unpublished,
        assets_failed: report.assets_failed,
    }))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/remove_file/:file_id", delete(remove_file))
}
