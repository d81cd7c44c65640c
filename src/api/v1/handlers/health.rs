/*
 * Responsibility
 * - GET /health (liveness)
 * - Fallback for unregistered routes (permission denied)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::error::AppError;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn permission_denied() -> AppError {
    AppError::PermissionDenied
}
