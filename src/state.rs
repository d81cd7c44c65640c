/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Clone-cheap: everything inside is Arc and read-only while serving
 */
use std::sync::Arc;

use crate::services::auth::{AuthorizeServices, PrincipalResolver};
use crate::services::authorize::AuthorizeHandler;

#[derive(Clone, Debug)]
pub struct AppState {
    pub resolver: Arc<PrincipalResolver>,
    pub authorize: Arc<AuthorizeHandler>,
}

impl AppState {
    pub fn new(services: AuthorizeServices) -> Self {
        Self {
            resolver: services.resolver,
            authorize: services.handler,
        }
    }
}
