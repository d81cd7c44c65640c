/*
 * Responsibility
 * - v1 URL layout
 * - /authorize is the forward-auth address configured in the reverse proxy
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::authorize::authorize;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/authorize", get(authorize))
}
