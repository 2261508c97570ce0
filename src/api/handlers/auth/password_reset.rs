//! Password-reset flow: initiate, preview, reset.

use axum::Json;
use axum::extract::Extension;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use super::types::{
    InitiatePasswordResetRequest, PasswordResetInfosRequest, PasswordResetInfosResponse,
    ResetPasswordRequest,
};
use crate::api::handlers::types::ServiceStatus;
use crate::api::handlers::utils::normalize_email;
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{LOG_EVENT_PASSWORD_RESET, LogEventType};
use crate::collab::messaging::{
    EMAIL_TYPE_PASSWORD_CHANGED, EMAIL_TYPE_PASSWORD_RESET, SendEmailReq,
};
use crate::crypto::password;
use crate::db::temp_tokens::{PURPOSE_PASSWORD_RESET, TempToken};
use crate::unix_now;

/// Reset links are valid for fifteen minutes.
const PASSWORD_RESET_TOKEN_LIFETIME: i64 = 15 * 60;

#[utoipa::path(
    post,
    path = "/v1/auth/password-reset/initiate",
    request_body = InitiatePasswordResetRequest,
    responses(
        (status = 200, description = "Accepted; never reveals whether the account exists", body = ServiceStatus),
        (status = 400, description = "Validation error", body = String)
    ),
    tag = "auth"
)]
pub async fn initiate_password_reset(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<InitiatePasswordResetRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.account_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.require_instance(&request.instance_id).await?;
    deps.maybe_sweep_temp_tokens();

    // The response is identical for unknown accounts.
    let response = ServiceStatus::normal("email sent");
    let account_id = normalize_email(&request.account_id);
    let Ok(user) = deps
        .users
        .get_user_by_account_id(&request.instance_id, &account_id)
        .await
    else {
        return Ok(Json(response));
    };

    if !user.can_trigger_password_reset(unix_now()) {
        warn!("password reset rate limit hit for user {}", user.id);
        return Ok(Json(response));
    }

    let token = deps
        .temp_tokens
        .add(TempToken::new(
            user.id,
            &request.instance_id,
            PURPOSE_PASSWORD_RESET,
            HashMap::new(),
            unix_now() + PASSWORD_RESET_TOKEN_LIFETIME,
        ))
        .await?;

    deps.users
        .append_password_reset_trigger(&request.instance_id, user.id)
        .await?;

    deps.send_email_detached(SendEmailReq {
        instance_id: request.instance_id.clone(),
        to: vec![user.account.account_id.clone()],
        message_type: EMAIL_TYPE_PASSWORD_RESET.to_string(),
        content_infos: [
            ("token".to_string(), token),
            (
                "validUntil".to_string(),
                (PASSWORD_RESET_TOKEN_LIFETIME / 60).to_string(),
            ),
        ]
        .into(),
        preferred_language: user.account.preferred_language.clone(),
        use_low_prio: false,
    });

    deps.save_log_event_detached(
        &request.instance_id,
        &user.id.to_string(),
        LogEventType::Log,
        LOG_EVENT_PASSWORD_RESET,
        "initiated",
    );

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/auth/password-reset/infos",
    request_body = PasswordResetInfosRequest,
    responses(
        (status = 200, description = "Account id for UI display", body = PasswordResetInfosResponse),
        (status = 400, description = "Wrong token", body = String)
    ),
    tag = "auth"
)]
pub async fn get_infos_for_password_reset(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<PasswordResetInfosRequest>>,
) -> Result<Json<PasswordResetInfosResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let token = deps
        .temp_tokens
        .validate(&request.token, &[PURPOSE_PASSWORD_RESET])
        .await?;
    let user = deps
        .users
        .get_user_by_id(&token.instance_id, token.user_id)
        .await?;

    Ok(Json(PasswordResetInfosResponse {
        account_id: user.account.account_id,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/password-reset/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = ServiceStatus),
        (status = 400, description = "Wrong token or weak password", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    if !password::check_password_format(&request.new_password) {
        return Err(ApiError::InvalidArgument("password too weak"));
    }

    let token = deps
        .temp_tokens
        .validate(&request.token, &[PURPOSE_PASSWORD_RESET])
        .await?;
    let user = deps
        .users
        .get_user_by_id(&token.instance_id, token.user_id)
        .await?;

    let password_hash = password::hash_password(&request.new_password)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    deps.users
        .update_password(&token.instance_id, user.id, &password_hash)
        .await?;

    if let Err(err) = deps.temp_tokens.delete(&request.token).await {
        error!("failed to delete used password-reset token: {err}");
    }

    deps.send_email_detached(SendEmailReq {
        instance_id: token.instance_id.clone(),
        to: vec![user.account.account_id.clone()],
        message_type: EMAIL_TYPE_PASSWORD_CHANGED.to_string(),
        content_infos: HashMap::new(),
        preferred_language: user.account.preferred_language.clone(),
        use_low_prio: true,
    });

    deps.save_log_event_detached(
        &token.instance_id,
        &user.id.to_string(),
        LogEventType::Log,
        LOG_EVENT_PASSWORD_RESET,
        "completed",
    );

    Ok(Json(ServiceStatus::normal("password changed")))
}

#[cfg(test)]
mod tests {
    use super::{get_infos_for_password_reset, initiate_password_reset, reset_password};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn missing_payloads_are_rejected() {
        let response = initiate_password_reset(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get_infos_for_password_reset(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = reset_password(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_rejects_weak_password() {
        let request = serde_json::from_value(serde_json::json!({
            "token": "reset-token",
            "new_password": "weakpass"
        }))
        .expect("request");
        let response = reset_password(Extension(test_deps()), Some(axum::Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
