use std::sync::Arc;

use crate::services::auth::token::Token;
use crate::services::auth::verify::VerifyTokenService;
use crate::services::authorize::handler::AuthorizeCommand;

/// Authenticated caller: the two tokens presented with the request,
/// each already run through verification.
#[derive(Debug, Clone)]
pub struct User {
    pub access_token: Token,
    pub id_token: Token,
}

/// Who is calling. Passed explicitly into the handler.
#[derive(Debug, Clone)]
pub enum Principal {
    Authenticated(User),
    Anonymous,
}

impl Principal {
    /// `(access_token, id_token)` as seen by the authorizer.
    pub fn tokens(&self) -> (Token, Token) {
        match self {
            Principal::Authenticated(user) => (user.access_token.clone(), user.id_token.clone()),
            Principal::Anonymous => (
                Token::invalid("anonymous user"),
                Token::invalid("anonymous user"),
            ),
        }
    }
}

/// Builds the [`Principal`] for a request from its raw credentials.
#[derive(Clone)]
pub struct PrincipalResolver {
    verifier: Arc<dyn VerifyTokenService>,
}

impl std::fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalResolver").finish_non_exhaustive()
    }
}

impl PrincipalResolver {
    pub fn new(verifier: Arc<dyn VerifyTokenService>) -> Self {
        Self { verifier }
    }

    /// No credentials at all is an anonymous caller; anything else is an
    /// authenticated caller whose tokens may still turn out invalid.
    pub fn resolve(&self, command: &AuthorizeCommand) -> Principal {
        let access = command.access_token.as_deref().filter(|t| !t.is_empty());
        let id = command.id_token.as_deref().filter(|t| !t.is_empty());

        if access.is_none() && id.is_none() {
            return Principal::Anonymous;
        }

        let access_token = access
            .map(|raw| self.verifier.verify(raw))
            .unwrap_or_else(|| Token::invalid("missing access token"));
        let id_token = id
            .map(|raw| self.verifier.verify(raw))
            .unwrap_or_else(|| Token::invalid("missing id token"));

        Principal::Authenticated(User {
            access_token,
            id_token,
        })
    }
}
