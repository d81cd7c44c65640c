use thiserror::Error;

use crate::services::auth::token::{JwtToken, Token};
use crate::services::authorize::requested_url::RequestedUrl;
use crate::services::authorize::state_machine::{AuthorizerStateMachine, Event, State};
use crate::services::policy::ApplicationPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizerError {
    #[error("invalid application policy: {0}")]
    InvalidPolicy(String),
    #[error("verified tokens unavailable while checking application rules")]
    TokensUnavailable,
    #[error("illegal authorizer transition from {from} on {event:?}")]
    IllegalTransition { from: State, event: Event },
}

/// Pure authorization decision over one request.
#[derive(Debug)]
pub struct Authorizer<'a> {
    access_token: &'a Token,
    id_token: &'a Token,
    app: &'a ApplicationPolicy,
    requested_url: &'a RequestedUrl,
    is_api: bool,
}

impl<'a> Authorizer<'a> {
    pub fn create(
        access_token: &'a Token,
        id_token: &'a Token,
        app: &'a ApplicationPolicy,
        requested_url: &'a RequestedUrl,
        is_api: bool,
    ) -> Self {
        Self {
            access_token,
            id_token,
            app,
            requested_url,
            is_api,
        }
    }

    /// Run the state machine to a terminal state. Never fails across this
    /// boundary: problems come back as `State::Error` plus the cause.
    pub fn authorize(&self) -> (State, Option<AuthorizerError>) {
        let mut machine = AuthorizerStateMachine::new(self.is_api);
        let mut error = None;

        while !machine.is_terminal() {
            let from = machine.state();
            let event = match from {
                State::Start => Event::Begin,
                State::CheckAccessToken => self.check_access_token(),
                State::CheckIdToken => self.check_id_token(),
                State::CheckApplicationRules => match self.check_application_rules() {
                    Ok(event) => event,
                    Err(err) => {
                        error = Some(err);
                        Event::Failure
                    }
                },
                // terminal states end the loop
                State::NeedRedirect | State::AccessGranted | State::AccessDenied | State::Error => {
                    break;
                }
            };

            if !machine.fire(event) && error.is_none() {
                error = Some(AuthorizerError::IllegalTransition { from, event });
            }
        }

        tracing::debug!(
            state = %machine.state(),
            host = %self.requested_url.host(),
            app = %self.app.name,
            is_api = self.is_api,
            "authorizer finished"
        );

        (machine.state(), error)
    }

    fn check_access_token(&self) -> Event {
        let token = match self.access_token {
            Token::Valid(token) => token,
            Token::Invalid(invalid) => {
                tracing::debug!(reason = %invalid.reason(), "invalid access token");
                return Event::InvalidAccessToken;
            }
        };

        if let Some(audience) = &self.app.audience {
            if !token.claims().has_audience(audience) {
                tracing::debug!(audience = %audience, "access token audience mismatch");
                return Event::InvalidAccessToken;
            }
        }

        Event::ValidAccessToken
    }

    fn check_id_token(&self) -> Event {
        let id_token = match self.id_token {
            Token::Valid(token) => token,
            Token::Invalid(invalid) => {
                tracing::debug!(reason = %invalid.reason(), "invalid id token");
                return Event::InvalidIdToken;
            }
        };

        // Both tokens must belong to the same subject when both name one.
        if let Some(access_token) = self.access_token.as_valid() {
            if let (Some(access_sub), Some(id_sub)) =
                (access_token.claims().subject(), id_token.claims().subject())
            {
                if access_sub != id_sub {
                    tracing::warn!("access token and id token subjects differ");
                    return Event::InvalidIdToken;
                }
            }
        }

        Event::ValidIdToken
    }

    fn check_application_rules(&self) -> Result<Event, AuthorizerError> {
        self.app
            .validate_rules()
            .map_err(AuthorizerError::InvalidPolicy)?;

        if !self.app.has_rules() {
            return Ok(Event::RulesPassed);
        }

        // Only reachable after both token checks passed.
        let (Some(access_token), Some(id_token)) =
            (self.access_token.as_valid(), self.id_token.as_valid())
        else {
            return Err(AuthorizerError::TokensUnavailable);
        };

        if satisfies_claims(id_token, self.app) && satisfies_permissions(access_token, self.app) {
            Ok(Event::RulesPassed)
        } else {
            Ok(Event::RulesFailed)
        }
    }
}

fn satisfies_claims(id_token: &JwtToken, app: &ApplicationPolicy) -> bool {
    app.required_claims.iter().all(|(name, expected)| {
        let ok = id_token
            .claims()
            .get(name)
            .is_some_and(|value| value.matches(expected));
        if !ok {
            tracing::debug!(claim = %name, expected = %expected, "required claim not satisfied");
        }
        ok
    })
}

fn satisfies_permissions(access_token: &JwtToken, app: &ApplicationPolicy) -> bool {
    app.required_permissions.iter().all(|permission| {
        let ok = access_token.claims().has_permission(permission);
        if !ok {
            tracing::debug!(permission = %permission, "required permission missing");
        }
        ok
    })
}
