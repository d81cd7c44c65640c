//! Authorize command handler.
//!
//! Resolves the application, pre-builds the redirect scaffolding, runs the
//! [`Authorizer`] and maps its terminal state onto exactly one [`AuthEvent`].

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use crate::services::auth::principal::Principal;
use crate::services::auth::token::Token;
use crate::services::auth::userinfo::extract_userinfo;
use crate::services::authorize::authorize_url::AuthorizeUrl;
use crate::services::authorize::authorizer::{Authorizer, AuthorizerError};
use crate::services::authorize::nonce::AuthorizeNonce;
use crate::services::authorize::requested_url::RequestedUrl;
use crate::services::authorize::state::{AuthorizeState, StateSigner};
use crate::services::authorize::state_machine::State;
use crate::services::policy::AuthorizeProperties;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Everything the handler needs to know about one forwarded request.
#[derive(Debug, Clone)]
pub struct AuthorizeCommand {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub protocol: String,
    pub host: String,
    pub uri: String,
    pub method: String,
    pub is_api: bool,
}

/// The single outcome of an authorize request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    NeedRedirect {
        authorize_url: Url,
        nonce: AuthorizeNonce,
        cookie_domain: String,
    },
    AccessGranted {
        userinfo: BTreeMap<String, String>,
    },
    AccessDenied,
    Error {
        reason: String,
    },
}

impl AuthEvent {
    fn error(reason: impl Into<String>) -> Self {
        AuthEvent::Error {
            reason: reason.into(),
        }
    }
}

impl From<Option<AuthorizerError>> for AuthEvent {
    fn from(error: Option<AuthorizerError>) -> Self {
        AuthEvent::error(error.map_or_else(|| UNKNOWN_ERROR.to_string(), |e| e.to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct AuthorizeHandler {
    properties: Arc<AuthorizeProperties>,
    signer: StateSigner,
}

impl AuthorizeHandler {
    pub fn new(properties: Arc<AuthorizeProperties>, signer: StateSigner) -> Self {
        Self { properties, signer }
    }

    pub fn signer(&self) -> &StateSigner {
        &self.signer
    }

    pub fn handle(&self, principal: &Principal, command: &AuthorizeCommand) -> AuthEvent {
        let app = self.properties.find_application_or_default(&command.host);

        let origin_url = match RequestedUrl::new(
            command.protocol.as_str(),
            command.host.as_str(),
            command.uri.as_str(),
            &command.method,
        ) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(error = %err, "invalid forwarded request");
                return AuthEvent::error(err.to_string());
            }
        };

        // Redirect scaffolding is built up front so the redirect branch below
        // only emits data.
        let nonce = match AuthorizeNonce::generate() {
            Ok(nonce) => nonce,
            Err(err) => {
                tracing::error!(error = %err, "nonce generation failed");
                return AuthEvent::error(err.to_string());
            }
        };
        let state = AuthorizeState::create(origin_url.clone(), nonce.clone());
        let encoded_state = match self.signer.encode(&state) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::error!(error = %err, "state encoding failed");
                return AuthEvent::error(err.to_string());
            }
        };
        let authorize_url =
            AuthorizeUrl::new(&self.properties.authorize_url, app, &encoded_state).to_uri();
        let cookie_domain = app.token_cookie_domain.clone();

        let (access_token, id_token) = principal.tokens();
        tracing::debug!(
            authenticated = matches!(principal, Principal::Authenticated(_)),
            app = %app.name,
            url = %origin_url,
            method = %origin_url.method(),
            is_api = command.is_api,
            "authorizing request"
        );

        let authorizer =
            Authorizer::create(&access_token, &id_token, app, &origin_url, command.is_api);
        let (authorizer_state, authorizer_error) = authorizer.authorize();

        tracing::debug!(state = %authorizer_state, error = ?authorizer_error, "authorize result");

        match authorizer_state {
            State::NeedRedirect => AuthEvent::NeedRedirect {
                authorize_url,
                nonce,
                cookie_domain,
            },
            State::AccessDenied => AuthEvent::AccessDenied,
            State::AccessGranted => match &id_token {
                Token::Valid(token) => AuthEvent::AccessGranted {
                    userinfo: extract_userinfo(token.claims(), &app.claims),
                },
                Token::Invalid(_) => AuthEvent::error("access granted without a verified id token"),
            },
            _ => AuthEvent::from(authorizer_error),
        }
    }
}
