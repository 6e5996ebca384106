//! HTTP API handlers for saarthi-api
//!
//! Handlers are thin adapters: validate the path id, call one service
//! operation, shape the JSON the frontend expects.

pub mod analysis;
pub mod health;
pub mod root;
pub mod sessions;
pub mod upload;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use root::root_routes;
pub use sessions::session_routes;
pub use upload::upload_routes;

use saarthi_common::uuid_utils;

use crate::error::ApiError;

/// Reject ids that were never issued before touching storage
pub(crate) fn require_session_id(file_id: &str) -> Result<(), ApiError> {
    if uuid_utils::is_session_id(file_id) {
        Ok(())
    } else {
        Err(ApiError::NotFound("File ID not found".to_string()))
    }
}
