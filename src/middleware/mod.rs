/*
 * Responsibility
 * - Middleware shared by every route (re-export)
 */
pub mod http;
