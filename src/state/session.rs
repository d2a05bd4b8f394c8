use super::token_store::TokenStoreError;
use crate::api::{ApiClient, ApiError, ApiErrorKind};
use crate::redact::redact_secrets;
use crate::types::{
    AdminInfo, Credentials, LoginRequest, LoginResponse, OperatorProfile, RefreshTokenRequest,
    SessionState, TokenPair, TokenResponse, TwoFactorRequest,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

const DEFAULT_CHALLENGE_MESSAGE: &str = "A verification code has been sent to your email.";
const TWO_FACTOR_CODE_LEN: usize = 6;
const UNREACHABLE_MESSAGE: &str = "Unable to reach the server.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{reason}")]
    Auth { reason: String },
    #[error("Verification code must be exactly 6 digits.")]
    InvalidCodeFormat,
    #[error("`{operation}` is not allowed while the session is {state}")]
    Precondition {
        operation: &'static str,
        state: &'static str,
    },
    #[error("failed to store session tokens: {0}")]
    Storage(#[from] TokenStoreError),
}

impl SessionError {
    /// Rejections the operator can fix by re-entering something.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::InvalidCodeFormat)
    }

    fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }
}

fn auth_from(err: &ApiError, fallback: &str) -> SessionError {
    let message = err.message.trim();
    let reason = match err.kind {
        ApiErrorKind::Transport if message.is_empty() => UNREACHABLE_MESSAGE.to_string(),
        ApiErrorKind::Transport if message.starts_with("Unable to reach the server") => {
            message.to_string()
        }
        ApiErrorKind::Transport => format!("Unable to reach the server: {message}"),
        _ if message.is_empty() => fallback.to_string(),
        _ => message.to_string(),
    };
    SessionError::auth(reason)
}

fn is_valid_code(code: &str) -> bool {
    code.len() == TWO_FACTOR_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// Owns the operator's authentication state and is the only writer to the
/// token store. Every operation runs under `op_lock`, so a store write and
/// the matching state transition are never interleaved with another
/// operation.
pub struct SessionManager {
    api: ApiClient,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
}

impl SessionManager {
    pub async fn new(api: ApiClient) -> Self {
        let initial = if api.tokens().current().await.is_some() {
            SessionState::Restoring
        } else {
            SessionState::Unauthenticated
        };
        let (state, _) = watch::channel(initial);
        Self {
            api,
            state,
            op_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        debug!(from = prev.name(), to = self.state.borrow().name(), "session transition");
    }

    async fn end_session(&self, reason: &'static str) {
        if let Err(err) = self.api.tokens().clear().await {
            warn!(reason, error = %err, "failed to clear stored tokens");
        }
        self.transition(SessionState::Unauthenticated);
    }

    /// Validates stored tokens against `/auth/me`. Never fails: any problem
    /// ends in `Unauthenticated` with the store cleared.
    pub async fn restore(&self) -> SessionState {
        let _op = self.op_lock.lock().await;
        if !matches!(*self.state.borrow(), SessionState::Restoring) {
            return self.state();
        }

        match self.api.get::<AdminInfo>("/auth/me").await {
            Ok(admin) => self.transition(SessionState::Authenticated {
                profile: OperatorProfile::from(admin),
            }),
            Err(err) => {
                warn!(
                    status = ?err.status,
                    error = %redact_secrets(&err.message),
                    "stored session could not be restored"
                );
                self.end_session("restore").await;
            }
        }
        self.state()
    }

    pub async fn login(&self, credentials: Credentials) -> Result<SessionState, SessionError> {
        let _op = self.op_lock.lock().await;
        let current = self.state();
        if matches!(
            current,
            SessionState::Restoring | SessionState::Authenticated { .. }
        ) {
            return Err(SessionError::Precondition {
                operation: "login",
                state: current.name(),
            });
        }

        let identifier = credentials.identifier.trim();
        if identifier.is_empty() || credentials.secret.is_empty() {
            return Err(SessionError::auth("Email and password are required."));
        }

        let request = LoginRequest {
            email: identifier,
            password: &credentials.secret,
        };
        let response = match self.api.post::<LoginResponse, _>("/auth/login", &request).await {
            Ok(response) => response,
            Err(err) => {
                self.transition(SessionState::Unauthenticated);
                return Err(auth_from(&err, "Login failed."));
            }
        };

        if response.requires_two_factor {
            let challenge_message = response
                .otp_message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_CHALLENGE_MESSAGE.to_string());
            self.transition(SessionState::PendingTwoFactor {
                identifier: identifier.to_string(),
                challenge_message,
            });
            return Ok(self.state());
        }

        self.establish(response, SessionState::Unauthenticated).await
    }

    pub async fn verify_two_factor(&self, code: &str) -> Result<SessionState, SessionError> {
        let _op = self.op_lock.lock().await;
        let pending = self.state();
        let SessionState::PendingTwoFactor { identifier, .. } = &pending else {
            return Err(SessionError::Precondition {
                operation: "verify_two_factor",
                state: pending.name(),
            });
        };
        if !is_valid_code(code) {
            return Err(SessionError::InvalidCodeFormat);
        }

        let request = TwoFactorRequest {
            email: identifier,
            otp: code,
        };
        let response = self
            .api
            .post::<LoginResponse, _>("/auth/verify-2fa", &request)
            .await
            .map_err(|err| auth_from(&err, "Verification failed."))?;

        self.establish(response, pending.clone()).await
    }

    /// Persists the returned pair and enters `Authenticated`. On any problem
    /// the store is left empty and the session moves to `on_failure`.
    async fn establish(
        &self,
        response: LoginResponse,
        on_failure: SessionState,
    ) -> Result<SessionState, SessionError> {
        let pair = TokenPair::from_parts(response.access_token, response.refresh_token);
        let (Some(pair), Some(admin)) = (pair, response.admin) else {
            self.transition(on_failure);
            return Err(SessionError::auth(
                "The server returned an incomplete sign-in response.",
            ));
        };

        if let Err(err) = self.api.tokens().save(&pair).await {
            if let Err(clear_err) = self.api.tokens().clear().await {
                warn!(error = %clear_err, "failed to clear tokens after a failed save");
            }
            self.transition(on_failure);
            return Err(SessionError::Storage(err));
        }

        self.transition(SessionState::Authenticated {
            profile: OperatorProfile::from(admin),
        });
        Ok(self.state())
    }

    pub async fn logout(&self) {
        let _op = self.op_lock.lock().await;
        if let Err(err) = self.api.post_empty::<Value>("/auth/logout").await {
            warn!(
                status = ?err.status,
                error = %redact_secrets(&err.message),
                "logout request failed; clearing local session anyway"
            );
        }
        self.end_session("logout").await;
    }

    /// Exchanges the stored refresh token for a new access token. Any failure
    /// ends the session.
    pub async fn refresh_access_token(&self) -> Result<(), SessionError> {
        let _op = self.op_lock.lock().await;
        let current = self.state();
        if !current.is_authenticated() {
            return Err(SessionError::Precondition {
                operation: "refresh_access_token",
                state: current.name(),
            });
        }

        let Some(stored) = self.api.tokens().current().await else {
            self.end_session("refresh").await;
            return Err(SessionError::auth("Session expired. Please sign in again."));
        };

        let request = RefreshTokenRequest {
            refresh_token: &stored.refresh_token,
        };
        let response = match self
            .api
            .post::<TokenResponse, _>("/auth/refresh", &request)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.end_session("refresh").await;
                return Err(auth_from(&err, "Session expired. Please sign in again."));
            }
        };

        let access_token = Some(response.access_token);
        let Some(pair) = TokenPair::from_parts(access_token, Some(stored.refresh_token)) else {
            self.end_session("refresh").await;
            return Err(SessionError::auth("The server returned an empty access token."));
        };
        if let Err(err) = self.api.tokens().save(&pair).await {
            self.end_session("refresh").await;
            return Err(SessionError::Storage(err));
        }
        debug!(expires_in = response.expires_in, "access token refreshed");
        Ok(())
    }

    /// Ends an authenticated session after the backend answered 401.
    /// Returns whether a session was ended.
    pub async fn handle_unauthorized(&self) -> bool {
        let _op = self.op_lock.lock().await;
        if !self.state.borrow().is_authenticated() {
            return false;
        }
        warn!("backend rejected the session token; signing out");
        self.end_session("unauthorized").await;
        true
    }

    /// Passes `result` through, ending the session first when it is a 401.
    pub async fn guard<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                self.handle_unauthorized().await;
            }
        }
        result
    }
}
