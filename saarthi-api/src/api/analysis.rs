//! Analysis endpoints
//!
//! Preview, missing-value report, summary statistics and full EDA for one
//! uploaded file. The wire name of the session id is `file_id`.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    api::require_session_id,
    error::ApiResult,
    models::{CategoricalSummary, ColumnTable, NumericSummary},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub file_id: String,
    pub original_filename: String,
    pub columns: Vec<String>,
    pub sample_data: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct MissingValuesResponse {
    pub file_id: String,
    pub missing_values: ColumnTable<usize>,
    pub missing_present: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub file_id: String,
    pub summary_statistics: Option<ColumnTable<NumericSummary>>,
    pub cat_summary: Option<ColumnTable<CategoricalSummary>>,
}

#[derive(Debug, Serialize)]
pub struct EdaResponse {
    pub file_id: String,
    pub summary_statistics: Option<ColumnTable<NumericSummary>>,
    pub cat_summary: Option<ColumnTable<CategoricalSummary>>,
    pub corr_figure_url: Option<String>,
    pub box_plot_url: Option<String>,
    pub histogram_figure_url: Option<String>,
    pub count_plots_url: Option<String>,
}

/// GET /get_file/{file_id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<PreviewResponse>> {
    require_session_id(&file_id)?;
    let preview = state.engine.get_preview(&file_id).await?;

    Ok(Json(PreviewResponse {
        file_id,
        original_filename: preview.original_filename,
        columns: preview.columns,
        sample_data: preview.rows,
    }))
}

/// GET /missingVals/{file_id}
pub async fn missing_values(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<MissingValuesResponse>> {
    require_session_id(&file_id)?;
    let report = state.engine.get_missing_report(&file_id).await?;

    Ok(Json(MissingValuesResponse {
        file_id,
        missing_values: report.missing_values,
        missing_present: report.missing_present,
    }))
}

/// GET /summary/{file_id}
pub async fn summary(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<SummaryResponse>> {
    require_session_id(&file_id)?;
    let summary = state.engine.get_summary(&file_id).await?;

    Ok(Json(SummaryResponse {
        file_id,
        summary_statistics: summary.numeric,
        cat_summary: summary.categorical,
    }))
}

/// GET /EDA/{file_id}
///
/// Failures are also recorded for the health endpoint.
pub async fn eda(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<EdaResponse>> {
    require_session_id(&file_id)?;

    let result = match state.engine.get_eda(&file_id).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(session_id = %file_id, error = %e, "EDA failed");
            *state.last_error.write().await = Some(format!("EDA {}: {}", file_id, e));
            return Err(e.into());
        }
    };

    Ok(Json(EdaResponse {
        file_id,
        summary_statistics: result.summary.numeric,
        cat_summary: result.summary.categorical,
        corr_figure_url: result.correlation_matrix_url,
        box_plot_url: result.box_plot_url,
        histogram_figure_url: result.histogram_url,
        count_plots_url: result.count_plot_url,
    }))
}

pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/get_file/:file_id", get(get_file))
        .route("/missingVals/:file_id", get(missing_values))
        .route("/summary/:file_id", get(summary))
        .route("/EDA/:file_id", get(eda))
}
