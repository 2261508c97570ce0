//! Request handlers and the shared dependency state they run against.

pub mod account;
pub mod auth;
pub mod health;
pub mod instances;
pub mod root;
pub mod temptokens;
pub mod types;
pub(crate) mod utils;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tracing::{error, info};

use crate::collab::logging::{LogEventType, LoggingClient, SaveLogEventReq};
use crate::collab::messaging::{MessagingClient, SendEmailReq};
use crate::crypto::jwt::{Claims, TokenSigner};
use crate::db::StoreError;
use crate::db::instances::InstanceStore;
use crate::db::temp_tokens::TempTokenStore;
use crate::db::users::UserStore;
use crate::unix_now;
use crate::users::LogicError;

/// Lazy temp-token sweeps run at most once per this window across the
/// process.
const TEMP_TOKEN_SWEEP_MIN_INTERVAL: i64 = 10 * 60;
const TEMP_TOKEN_SWEEP_GRACE: i64 = 3600;

/// Service-level tunables, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Access-token lifetime in minutes.
    pub token_expiry_min: i64,
    /// 2FA verification-code lifetime in seconds.
    pub verification_code_lifetime: i64,
    /// Invitation temp-token lifetime in seconds.
    pub invitation_token_lifetime: i64,
    /// Contact-verification temp-token lifetime in seconds.
    pub contact_verification_token_lifetime: i64,
    /// Signups allowed per hour before the invitation requirement kicks in.
    pub new_user_count_limit: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token_expiry_min: 60,
            verification_code_lifetime: 5 * 60,
            invitation_token_lifetime: 7 * 24 * 60 * 60,
            contact_verification_token_lifetime: 30 * 24 * 60 * 60,
            new_user_count_limit: 100,
        }
    }
}

/// Everything a handler needs, shared via an axum `Extension<Arc<Deps>>`.
pub struct Deps {
    pub users: UserStore,
    pub temp_tokens: TempTokenStore,
    pub instances: InstanceStore,
    pub signer: TokenSigner,
    pub messaging: Option<MessagingClient>,
    pub logging: Option<LoggingClient>,
    pub config: ServiceConfig,
    last_temp_token_sweep: AtomicI64,
}

impl Deps {
    #[must_use]
    pub fn new(
        users: UserStore,
        temp_tokens: TempTokenStore,
        instances: InstanceStore,
        signer: TokenSigner,
        messaging: Option<MessagingClient>,
        logging: Option<LoggingClient>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            users,
            temp_tokens,
            instances,
            signer,
            messaging,
            logging,
            config,
            last_temp_token_sweep: AtomicI64::new(0),
        }
    }

    /// Verify a signed access token, rejecting expired and malformed ones.
    ///
    /// # Errors
    /// `ApiError::InvalidToken` for anything other than a live valid token.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::MissingArgument);
        }
        self.signer
            .verify(token, unix_now())
            .map_err(|_| ApiError::InvalidToken)
    }

    /// Reject requests for instance ids that are not registered.
    ///
    /// # Errors
    /// `ApiError::InvalidArgument` for unknown ids, `ApiError::MissingArgument`
    /// for empty ones.
    pub async fn require_instance(&self, instance_id: &str) -> Result<(), ApiError> {
        if instance_id.is_empty() {
            return Err(ApiError::MissingArgument);
        }
        match self.instances.get_instance(instance_id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(ApiError::InvalidArgument("invalid instance id")),
            Err(err) => Err(err.into()),
        }
    }

    /// Fire an email from a detached task; failures are logged, never
    /// surfaced.
    pub fn send_email_detached(&self, request: SendEmailReq) {
        let Some(client) = self.messaging.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = client.send_instant_email(&request).await {
                error!(
                    message_type = %request.message_type,
                    "failed to send email: {err}"
                );
            }
        });
    }

    /// Emit an audit event from a detached task; failures are logged, never
    /// surfaced.
    pub fn save_log_event_detached(
        &self,
        instance_id: &str,
        actor: &str,
        event_type: LogEventType,
        event_name: &str,
        detail: &str,
    ) {
        let Some(client) = self.logging.clone() else {
            return;
        };
        let request = SaveLogEventReq {
            instance_id: instance_id.to_string(),
            actor: actor.to_string(),
            event_type,
            event_name: event_name.to_string(),
            detail: detail.to_string(),
        };
        tokio::spawn(async move {
            if let Err(err) = client.save_log_event(&request).await {
                error!(event_name = %request.event_name, "failed to save log event: {err}");
            }
        });
    }

    /// Start a lazy expired-token sweep, at most once per ten-minute window
    /// across concurrent requests. The atomic is the only gate; the sweep
    /// itself runs detached.
    pub fn maybe_sweep_temp_tokens(&self) {
        let now = unix_now();
        let last = self.last_temp_token_sweep.load(Ordering::Relaxed);
        if last + TEMP_TOKEN_SWEEP_MIN_INTERVAL >= now {
            return;
        }
        if self
            .last_temp_token_sweep
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let store = self.temp_tokens.clone();
        tokio::spawn(async move {
            match store.delete_expired(TEMP_TOKEN_SWEEP_GRACE).await {
                Ok(count) if count > 0 => info!("removed {count} expired temp tokens"),
                Ok(_) => {}
                Err(err) => error!("expired temp token sweep failed: {err}"),
            }
        });
    }
}

/// Error taxonomy mapped onto HTTP at the boundary. Messages come from a
/// fixed vocabulary so clients can branch on exact text.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing argument")]
    MissingArgument,
    #[error("{0}")]
    InvalidArgument(&'static str),
    #[error("invalid username and/or password")]
    InvalidCredentials,
    #[error("account not verified")]
    AccountNotVerified,
    #[error("invalid token")]
    InvalidToken,
    #[error("not authorized")]
    NotAuthorized,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("wrong token")]
    WrongToken,
    #[error("wrong refresh token")]
    WrongRefreshToken,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingArgument
            | Self::InvalidArgument(_)
            | Self::InvalidCredentials
            | Self::WrongToken
            | Self::WrongRefreshToken => StatusCode::BAD_REQUEST,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::AccountNotVerified | Self::NotAuthorized => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // Not-found is deliberately flattened to avoid enumeration.
            StoreError::NotFound => Self::Internal("not found".to_string()),
            StoreError::AlreadyExists => Self::Internal("already exists".to_string()),
            StoreError::WrongToken => Self::WrongToken,
            StoreError::Cancelled
            | StoreError::Callback(_)
            | StoreError::Corrupt(_)
            | StoreError::Database(_) => {
                error!("storage error: {err}");
                Self::Internal("internal error".to_string())
            }
        }
    }
}

impl From<LogicError> for ApiError {
    fn from(err: LogicError) -> Self {
        match err {
            LogicError::WrongRefreshToken => Self::WrongRefreshToken,
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{Deps, ServiceConfig};
    use crate::crypto::jwt::TokenSigner;
    use crate::db::instances::InstanceStore;
    use crate::db::temp_tokens::TempTokenStore;
    use crate::db::users::UserStore;
    use rand::rngs::OsRng;
    use rsa::RsaPrivateKey;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::{Arc, OnceLock};

    static TEST_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

    pub(crate) fn test_signer() -> TokenSigner {
        let key =
            TEST_KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 2048).expect("test key"));
        TokenSigner::from_private_key(key.clone())
    }

    /// Deps wired to lazy pools: validation paths run without a database.
    pub(crate) fn test_deps() -> Arc<Deps> {
        let user_pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        let global_pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        Arc::new(Deps::new(
            UserStore::new(user_pool, false),
            TempTokenStore::new(global_pool.clone()),
            InstanceStore::new(global_pool),
            test_signer(),
            None,
            None,
            ServiceConfig::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use crate::db::StoreError;
    use crate::users::LogicError;
    use axum::http::StatusCode;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(ApiError::MissingArgument.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotAuthorized.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::AccountNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_is_flattened_to_internal() {
        let err: ApiError = StoreError::NotFound.into();
        assert!(matches!(err, ApiError::Internal(msg) if msg == "not found"));
    }

    #[test]
    fn replay_maps_to_wrong_refresh_token() {
        let err: ApiError = LogicError::WrongRefreshToken.into();
        assert_eq!(err.to_string(), "wrong refresh token");
    }

    #[test]
    fn fixed_vocabulary_is_stable() {
        assert_eq!(ApiError::MissingArgument.to_string(), "missing argument");
        assert_eq!(
            ApiError::InvalidCredentials.to_string(),
            "invalid username and/or password"
        );
        assert_eq!(ApiError::WrongToken.to_string(), "wrong token");
        assert_eq!(ApiError::NotAuthorized.to_string(), "not authorized");
    }
}
