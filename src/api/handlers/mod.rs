use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::db::Database;
use crate::error::Error;
use crate::models::*;

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================
// Error Handling
// ============================================================

/// Map a resolution error to a response.
///
/// Validation failures are reported verbatim. Storage failures are logged
/// in full and answered with a generic message so no database detail leaks
/// to the client.
fn api_error(e: Error) -> ApiError {
    match e {
        Error::MissingIdentifier => {
            tracing::warn!("Validation error: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Error::Storage(_) => {
            tracing::error!("Internal error: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn error_response(status: StatusCode, error: String) -> ApiError {
    (status, Json(ErrorResponse { error }))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Identify
// ============================================================

pub async fn identify(
    State(db): State<Database>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let Json(input) = payload.map_err(|rejection| {
        tracing::warn!("Rejected request body: {}", rejection.body_text());
        error_response(rejection.status(), rejection.body_text())
    })?;

    let observation = input.into_observation().map_err(api_error)?;

    db.identify(&observation)
        .map(|contact| Json(IdentifyResponse { contact }))
        .map_err(api_error)
}
