use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

use super::service::SessionService;
use super::types::{LoginRequest, LogoutRequest, RegisterRequest};
use crate::shared::AppError;
use crate::token::TokenPair;
use crate::user::PublicIdentity;

/// Lifecycle of one login session
#[derive(Debug, Clone)]
pub enum SessionState {
    Anonymous,
    Authenticated(TokenPair),
    /// Terminal for the token pair; a new login starts a fresh session
    Revoked,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Revoked => "revoked",
        }
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        match self {
            SessionState::Authenticated(pair) => Some(pair),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Registered,
    LoginSucceeded(TokenPair),
    LoginFailed,
    LogoutSucceeded,
    LogoutFailed,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionEvent::Registered => "register",
            SessionEvent::LoginSucceeded(_) => "login succeeded",
            SessionEvent::LoginFailed => "login failed",
            SessionEvent::LogoutSucceeded => "logout succeeded",
            SessionEvent::LogoutFailed => "logout failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("cannot apply '{event}' in state '{state}'")]
    InvalidTransition { state: &'static str, event: String },

    #[error(transparent)]
    App(#[from] AppError),
}

/// Computes the next state; performs no I/O
pub fn transition(state: &SessionState, event: SessionEvent) -> Result<SessionState, SessionError> {
    use SessionEvent::*;
    use SessionState::*;

    match (state, event) {
        (Anonymous | Revoked, Registered) => Ok(state.clone()),
        (Anonymous | Revoked, LoginSucceeded(pair)) => Ok(Authenticated(pair)),
        (Anonymous | Revoked, LoginFailed) => Ok(state.clone()),
        (Authenticated(_), LogoutSucceeded) => Ok(Revoked),
        (Authenticated(pair), LogoutFailed) => Ok(Authenticated(pair.clone())),
        (state, event) => Err(SessionError::InvalidTransition {
            state: state.name(),
            event: event.to_string(),
        }),
    }
}

/// Client-side handle that drives one session through the service
pub struct Session {
    service: Arc<SessionService>,
    state: SessionState,
}

impl Session {
    pub fn new(service: Arc<SessionService>) -> Self {
        Self {
            service,
            state: SessionState::Anonymous,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let next = transition(&self.state, event)?;
        debug!(from = self.state.name(), to = next.name(), "Session transition");
        self.state = next;
        Ok(())
    }

    fn reject_when_authenticated(&self, event: &str) -> Result<(), SessionError> {
        match self.state {
            SessionState::Authenticated(_) => Err(SessionError::InvalidTransition {
                state: self.state.name(),
                event: event.to_string(),
            }),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn register(&mut self, request: RegisterRequest) -> Result<PublicIdentity, SessionError> {
        self.reject_when_authenticated("register")?;
        let identity = self.service.register(request).await?;
        self.apply(SessionEvent::Registered)?;
        Ok(identity)
    }

    #[instrument(skip(self, request))]
    pub async fn login(&mut self, request: LoginRequest) -> Result<(), SessionError> {
        self.reject_when_authenticated("login")?;
        match self.service.login(request).await {
            Ok(pair) => self.apply(SessionEvent::LoginSucceeded(pair)),
            Err(e) => {
                self.apply(SessionEvent::LoginFailed)?;
                Err(e.into())
            }
        }
    }

    /// Revokes the session's own refresh token
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<(), SessionError> {
        let pair = self
            .state
            .tokens()
            .cloned()
            .ok_or_else(|| SessionError::InvalidTransition {
                state: self.state.name(),
                event: "logout".to_string(),
            })?;

        let outcome = match self.service.authorize(&pair.access_token).await {
            Ok(claims) => {
                self.service
                    .logout(
                        &claims,
                        LogoutRequest {
                            refresh_token: Some(pair.refresh_token.clone()),
                        },
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => self.apply(SessionEvent::LogoutSucceeded),
            Err(e) => {
                self.apply(SessionEvent::LogoutFailed)?;
                Err(e.into())
            }
        }
    }
}
