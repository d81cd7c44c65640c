/*
 * Responsibility
 * - auth: token verification, principal resolution, user-info projection
 * - authorize: forward-auth decision (state machine, redirect protocol, handler)
 * - policy: per-application access configuration
 */
pub mod auth;
pub mod authorize;
pub mod policy;
