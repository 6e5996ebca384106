//! File upload
//!
//! POST /uploadfile/ with a multipart `file` field

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Multipart field carrying the data file
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: String,
}

/// POST /uploadfile/
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let session = state.uploads.create_session(&file_name, field).await?;

        return Ok(Json(UploadResponse {
            file_id: session.session_id,
        }));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploadfile/", post(upload_file))
        .route("/uploadfile", post(upload_file))
}
