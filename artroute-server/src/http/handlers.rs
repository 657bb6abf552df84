use artroute_model::{AnalysisRequest, AnalyzeArtifactRequest, ApiResponse};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use super::{
    AppState,
    errors::{ApiError, ApiResult, PARSE_FAILURE, SCHEDULE_FAILURE},
};

pub const QUEUED: &str = "artifact analysis queued successfully";

pub async fn health() -> Json<Value> {
    Json(json!({ "health": "ok" }))
}

/// Hands an analysis request to the dispatcher.
///
/// Responds once the dispatcher has taken the request, not when routing
/// has finished.
pub async fn analyze_artifact(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeArtifactRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let Json(body) = body.map_err(|rejection| {
        warn!(
            target: "artroute::http",
            error = %rejection.body_text(),
            "rejecting malformed analysis request"
        );
        ApiError::bad_request(PARSE_FAILURE)
    })?;

    let request = AnalysisRequest::from(body);
    info!(
        target: "artroute::http",
        image_reference = %request.image_reference,
        namespace = %request.namespace,
        "received analysis request"
    );

    let image_reference = request.image_reference.clone();
    let namespace = request.namespace.clone();
    state.client.submit(request).await.map_err(|err| {
        error!(
            target: "artroute::http",
            error = %err,
            image_reference = %image_reference,
            namespace = %namespace,
            "unable to schedule analysis request"
        );
        ApiError::internal(SCHEDULE_FAILURE)
    })?;

    Ok(Json(ApiResponse::message(StatusCode::OK.as_u16(), QUEUED)))
}
