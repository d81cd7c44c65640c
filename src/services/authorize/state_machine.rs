//! Authorizer state machine.
//!
//! ```text
//! Start ──Begin──▶ CheckAccessToken ──ValidAccessToken──▶ CheckIdToken ──ValidIdToken──▶ CheckApplicationRules
//!                        │                                    │                              │        │
//!              InvalidAccessToken                       InvalidIdToken                 RulesPassed  RulesFailed
//!                        ▼                                    ▼                              ▼        ▼
//!              NeedRedirect (browser) / AccessDenied (api)                           AccessGranted  AccessDenied
//!
//! any state ──Failure──▶ Error
//! ```
//!
//! Transitions not listed resolve to `Error`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Start,
    CheckAccessToken,
    CheckIdToken,
    CheckApplicationRules,
    NeedRedirect,
    AccessGranted,
    AccessDenied,
    Error,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            State::NeedRedirect | State::AccessGranted | State::AccessDenied | State::Error
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Start => "START",
            State::CheckAccessToken => "CHECK_ACCESS_TOKEN",
            State::CheckIdToken => "CHECK_ID_TOKEN",
            State::CheckApplicationRules => "CHECK_APPLICATION_RULES",
            State::NeedRedirect => "NEED_REDIRECT",
            State::AccessGranted => "ACCESS_GRANTED",
            State::AccessDenied => "ACCESS_DENIED",
            State::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Begin,
    ValidAccessToken,
    InvalidAccessToken,
    ValidIdToken,
    InvalidIdToken,
    RulesPassed,
    RulesFailed,
    Failure,
}

/// One machine per decision. `is_api` selects how an invalid session ends:
/// browsers can follow a login redirect, API clients get a denial.
#[derive(Debug, Clone)]
pub struct AuthorizerStateMachine {
    state: State,
    is_api: bool,
}

impl AuthorizerStateMachine {
    pub fn new(is_api: bool) -> Self {
        Self {
            state: State::Start,
            is_api,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn invalid_session(&self) -> State {
        if self.is_api {
            State::AccessDenied
        } else {
            State::NeedRedirect
        }
    }

    fn next(&self, event: Event) -> Option<State> {
        use Event::*;
        use State::*;

        if self.state.is_terminal() {
            return None;
        }

        match (self.state, event) {
            (_, Failure) => Some(Error),
            (Start, Begin) => Some(CheckAccessToken),
            (CheckAccessToken, ValidAccessToken) => Some(CheckIdToken),
            (CheckAccessToken, InvalidAccessToken) => Some(self.invalid_session()),
            (CheckIdToken, ValidIdToken) => Some(CheckApplicationRules),
            (CheckIdToken, InvalidIdToken) => Some(self.invalid_session()),
            (CheckApplicationRules, RulesPassed) => Some(AccessGranted),
            (CheckApplicationRules, RulesFailed) => Some(AccessDenied),
            _ => None,
        }
    }

    /// Apply `event`. An event the current state does not accept moves the
    /// machine to `Error` and is reported back as `false`.
    pub fn fire(&mut self, event: Event) -> bool {
        let from = self.state;
        match self.next(event) {
            Some(to) => {
                tracing::trace!(from = %from, ?event, to = %to, "authorizer transition");
                self.state = to;
                true
            }
            None => {
                tracing::warn!(from = %from, ?event, "illegal authorizer transition");
                self.state = State::Error;
                false
            }
        }
    }
}
