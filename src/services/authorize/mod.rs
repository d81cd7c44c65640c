//! Forward-auth decision core.
//!
//! Everything in here is synchronous and request-scoped; shared inputs
//! (`AuthorizeProperties`, `StateSigner`) are read-only.

pub mod authorize_url;
pub mod authorizer;
pub mod handler;
pub mod nonce;
pub mod requested_url;
pub mod state;
pub mod state_machine;

pub use authorize_url::AuthorizeUrl;
pub use authorizer::{Authorizer, AuthorizerError};
pub use handler::{AuthEvent, AuthorizeCommand, AuthorizeHandler};
pub use nonce::AuthorizeNonce;
pub use requested_url::RequestedUrl;
pub use state::{AuthorizeState, StateError, StateSigner};
pub use state_machine::{AuthorizerStateMachine, State};
