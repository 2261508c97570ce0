//! Capability-token persistence.
//!
//! Every asynchronous flow (confirm email, reset password, restore account
//! id, unsubscribe, invitation, survey login) hands out one of these opaque
//! bearer tokens. The string itself is the primary key; expired rows are
//! swept lazily by the endpoints.

use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;
use tracing::Instrument;
use uuid::Uuid;

use super::{StoreError, is_unique_violation, query_span};
use crate::crypto::random;
use crate::unix_now;

pub const PURPOSE_PASSWORD_RESET: &str = "password-reset";
pub const PURPOSE_CONTACT_VERIFICATION: &str = "contact-verification";
pub const PURPOSE_RESTORE_ACCOUNT_ID: &str = "restore-account-id";
pub const PURPOSE_INVITATION: &str = "invitation";
pub const PURPOSE_UNSUBSCRIBE_NEWSLETTER: &str = "unsubscribe-newsletter";
pub const PURPOSE_SURVEY_LOGIN: &str = "survey-login";

/// Fallback lifetime when a caller passes no expiry: 10 days.
const DEFAULT_TOKEN_LIFETIME: i64 = 10 * 24 * 60 * 60;

/// Single-purpose bearer capability with an expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempToken {
    pub token: String,
    pub user_id: Uuid,
    pub instance_id: String,
    pub purpose: String,
    pub info: HashMap<String, String>,
    pub expires_at: i64,
}

impl TempToken {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        instance_id: &str,
        purpose: &str,
        info: HashMap<String, String>,
        expires_at: i64,
    ) -> Self {
        Self {
            token: String::new(),
            user_id,
            instance_id: instance_id.to_string(),
            purpose: purpose.to_string(),
            info,
            expires_at,
        }
    }
}

#[derive(Clone)]
pub struct TempTokenStore {
    pool: PgPool,
}

impl TempTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a token, generating its opaque string.
    ///
    /// A zero expiry falls back to the default lifetime. Existing tokens for
    /// the same `(user, purpose)` are left alone; callers purge explicitly
    /// when they want single-use semantics.
    ///
    /// # Errors
    /// Surfaces database failures, or an internal error if no unique string
    /// could be generated.
    pub async fn add(&self, mut token: TempToken) -> Result<String, StoreError> {
        if token.expires_at == 0 {
            token.expires_at = unix_now() + DEFAULT_TOKEN_LIFETIME;
        }

        let query = "INSERT INTO temp_tokens (token, user_id, instance_id, purpose, info, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6)";
        for _ in 0..3 {
            let token_string =
                random::unique_token().map_err(StoreError::Callback)?;
            let result = sqlx::query(query)
                .bind(&token_string)
                .bind(token.user_id)
                .bind(&token.instance_id)
                .bind(&token.purpose)
                .bind(serde_json::to_value(&token.info)?)
                .bind(token.expires_at)
                .execute(&self.pool)
                .instrument(query_span("INSERT", query))
                .await;
            match result {
                Ok(_) => return Ok(token_string),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::Callback(anyhow::anyhow!(
            "failed to generate unique temp token"
        )))
    }

    /// # Errors
    /// `StoreError::NotFound` when the token string is unknown.
    pub async fn get(&self, token_string: &str) -> Result<TempToken, StoreError> {
        let query = "SELECT token, user_id, instance_id, purpose, info, expires_at \
             FROM temp_tokens WHERE token = $1";
        let row = sqlx::query(query)
            .bind(token_string)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| token_from_row(&row))
    }

    /// List a user's tokens, optionally narrowed to one purpose.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn get_for_user(
        &self,
        instance_id: &str,
        user_id: Uuid,
        purpose: Option<&str>,
    ) -> Result<Vec<TempToken>, StoreError> {
        let query = "SELECT token, user_id, instance_id, purpose, info, expires_at \
             FROM temp_tokens \
             WHERE instance_id = $1 AND user_id = $2 AND ($3::text IS NULL OR purpose = $3) \
             ORDER BY expires_at";
        let rows = sqlx::query(query)
            .bind(instance_id)
            .bind(user_id)
            .bind(purpose)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        rows.iter().map(token_from_row).collect()
    }

    /// Delete by token string; deleting an absent token is not an error.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn delete(&self, token_string: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM temp_tokens WHERE token = $1";
        sqlx::query(query)
            .bind(token_string)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(())
    }

    /// Purge a user's tokens, optionally only one purpose.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn delete_all_for_user(
        &self,
        instance_id: &str,
        user_id: Uuid,
        purpose: Option<&str>,
    ) -> Result<(), StoreError> {
        let query = "DELETE FROM temp_tokens \
             WHERE instance_id = $1 AND user_id = $2 AND ($3::text IS NULL OR purpose = $3)";
        sqlx::query(query)
            .bind(instance_id)
            .bind(user_id)
            .bind(purpose)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(())
    }

    /// Sweep tokens that expired more than `grace_period` seconds ago.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn delete_expired(&self, grace_period: i64) -> Result<u64, StoreError> {
        let query = "DELETE FROM temp_tokens WHERE expires_at < $1";
        let result = sqlx::query(query)
            .bind(unix_now() - grace_period)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }

    /// Resolve a token that must be live and carry one of the allowed
    /// purposes.
    ///
    /// # Errors
    /// `StoreError::WrongToken` when the token is missing, expired or minted
    /// for another purpose.
    pub async fn validate(
        &self,
        token_string: &str,
        allowed_purposes: &[&str],
    ) -> Result<TempToken, StoreError> {
        let token = match self.get(token_string).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => return Err(StoreError::WrongToken),
            Err(err) => return Err(err),
        };
        if token.expires_at < unix_now() {
            return Err(StoreError::WrongToken);
        }
        if !allowed_purposes.is_empty()
            && !allowed_purposes.contains(&token.purpose.as_str())
        {
            return Err(StoreError::WrongToken);
        }
        Ok(token)
    }
}

fn token_from_row(row: &PgRow) -> Result<TempToken, StoreError> {
    Ok(TempToken {
        token: row.try_get("token")?,
        user_id: row.try_get("user_id")?,
        instance_id: row.try_get("instance_id")?,
        purpose: row.try_get("purpose")?,
        info: serde_json::from_value(row.try_get("info")?)?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_TOKEN_LIFETIME, TempToken};
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn new_token_has_no_string_yet() {
        let token = TempToken::new(
            Uuid::new_v4(),
            "inst1",
            super::PURPOSE_PASSWORD_RESET,
            HashMap::new(),
            0,
        );
        assert!(token.token.is_empty());
        assert_eq!(token.purpose, "password-reset");
        assert_eq!(token.expires_at, 0);
    }

    #[test]
    fn default_lifetime_is_ten_days() {
        assert_eq!(DEFAULT_TOKEN_LIFETIME, 864_000);
    }

    #[test]
    fn info_round_trips_through_jsonb_value() {
        let info: HashMap<String, String> = [
            ("oldEmail".to_string(), "a@example.org".to_string()),
            ("newEmail".to_string(), "b@example.org".to_string()),
        ]
        .into();
        let value = serde_json::to_value(&info).expect("encode");
        let decoded: HashMap<String, String> = serde_json::from_value(value).expect("decode");
        assert_eq!(decoded, info);
    }
}
