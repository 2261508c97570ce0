//! Login endpoint, including the 2FA verification-code step.

use axum::Json;
use axum::extract::Extension;
use std::sync::Arc;
use tracing::warn;

use super::types::{LoginRequest, LoginResponse};
use super::{
    VERIFICATION_CODE_MAX_ATTEMPTS, generate_and_send_verification_code, mint_tokens,
    token_response, verification_code_matches,
};
use crate::api::handlers::utils::normalize_email;
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{
    LOG_EVENT_LOGIN_SUCCESS, LOG_EVENT_WRONG_PASSWORD, LogEventType,
};
use crate::crypto::password;
use crate::unix_now;
use crate::users::User;

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued, or a second factor is required", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = String),
        (status = 403, description = "Account not verified", body = String)
    ),
    tag = "auth"
)]
pub async fn login_with_email(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.email.is_empty() || request.password.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.require_instance(&request.instance_id).await?;

    let email = normalize_email(&request.email);
    let mut user = match deps
        .users
        .get_user_by_account_id(&request.instance_id, &email)
        .await
    {
        Ok(user) => user,
        // Same response as a wrong password, so accounts cannot be probed.
        Err(_) => return Err(ApiError::InvalidCredentials),
    };

    let now = unix_now();
    if !password::compare_with_hash(&user.account.password_hash, &request.password) {
        if let Err(err) = deps
            .users
            .append_failed_login(&request.instance_id, user.id)
            .await
        {
            warn!("failed to record login attempt: {err}");
        }
        deps.save_log_event_detached(
            &request.instance_id,
            &user.id.to_string(),
            LogEventType::Security,
            LOG_EVENT_WRONG_PASSWORD,
            "login endpoint",
        );
        return Err(ApiError::InvalidCredentials);
    }

    if user.is_login_blocked(now) {
        return Err(ApiError::InvalidCredentials);
    }

    if user.account.account_confirmed_at <= 0 {
        return Err(ApiError::AccountNotVerified);
    }

    if request.has_2fa {
        match request
            .verification_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            None => {
                // Reuse a fresh untouched code instead of spamming new ones.
                if !user.has_unused_verification_code_newer_than(
                    deps.config.verification_code_lifetime,
                    now,
                ) {
                    generate_and_send_verification_code(&deps, &request.instance_id, user)
                        .await?;
                }
                return Ok(Json(LoginResponse {
                    token: None,
                    second_factor_needed: true,
                }));
            }
            Some(submitted) => {
                check_verification_code(&deps, &request.instance_id, &mut user, submitted, now)
                    .await?;
            }
        }
    }

    user.trim_attempt_logs(now);
    let roles = user.roles.clone();
    let (access_token, refresh_token, profile_id) = mint_tokens(
        &deps,
        &request.instance_id,
        &mut user,
        None,
        &roles,
        &email,
    )?;
    let user = deps.users.update_user(&request.instance_id, &user).await?;
    deps.users
        .update_login_time(&request.instance_id, user.id)
        .await?;

    deps.save_log_event_detached(
        &request.instance_id,
        &user.id.to_string(),
        LogEventType::Log,
        LOG_EVENT_LOGIN_SUCCESS,
        "",
    );

    Ok(Json(LoginResponse {
        token: Some(token_response(
            &deps,
            &user,
            access_token,
            refresh_token,
            profile_id,
        )),
        second_factor_needed: false,
    }))
}

/// Validate a submitted 2FA code; a match clears it, a mismatch burns one of
/// its three attempts.
async fn check_verification_code(
    deps: &Deps,
    instance_id: &str,
    user: &mut User,
    submitted: &str,
    now: i64,
) -> Result<(), ApiError> {
    let Some(stored) = user.account.verification_code.clone() else {
        return Err(ApiError::InvalidArgument("wrong verification code"));
    };
    if stored.expires_at <= now || stored.attempts >= VERIFICATION_CODE_MAX_ATTEMPTS {
        return Err(ApiError::InvalidArgument("wrong verification code"));
    }

    if !verification_code_matches(submitted, &stored.code) {
        if let Some(code) = user.account.verification_code.as_mut() {
            code.attempts += 1;
        }
        // Persist the burned attempt before rejecting.
        if let Err(err) = deps.users.update_user(instance_id, user).await {
            warn!("failed to record verification code attempt: {err}");
        }
        return Err(ApiError::InvalidArgument("wrong verification code"));
    }

    user.account.verification_code = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::check_verification_code;
    use crate::api::handlers::ApiError;
    use crate::api::handlers::test_support::test_deps;
    use crate::users::{User, VerificationCode};

    const NOW: i64 = 1_700_000_000;

    fn user_with_code(code: &str, attempts: i64) -> User {
        let mut user =
            User::new_email_user("alice@example.org", "$argon2id$hash", "en", false, 1, NOW);
        user.account.verification_code = Some(VerificationCode {
            code: code.to_string(),
            attempts,
            created_at: NOW,
            expires_at: NOW + 300,
        });
        user
    }

    #[tokio::test]
    async fn matching_code_clears_it() {
        let deps = test_deps();
        let mut user = user_with_code("123456", 0);
        check_verification_code(&deps, "inst1", &mut user, "123456", NOW)
            .await
            .expect("match");
        assert!(user.account.verification_code.is_none());
    }

    #[tokio::test]
    async fn exhausted_code_cannot_succeed() {
        let deps = test_deps();
        let mut user = user_with_code("123456", 3);
        let result = check_verification_code(&deps, "inst1", &mut user, "123456", NOW).await;
        assert!(matches!(result, Err(ApiError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn expired_code_cannot_succeed() {
        let deps = test_deps();
        let mut user = user_with_code("123456", 0);
        if let Some(code) = user.account.verification_code.as_mut() {
            code.expires_at = NOW - 1;
        }
        let result = check_verification_code(&deps, "inst1", &mut user, "123456", NOW).await;
        assert!(matches!(result, Err(ApiError::InvalidArgument(_))));
    }
}
