//! Access-token validation, renewal and revocation.

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::error;

use super::types::{RenewJwtRequest, TokenInfos, ValidateJwtRequest};
use super::{mint_tokens, token_response};
use crate::api::handlers::types::{ServiceStatus, TokenResponse};
use crate::api::handlers::utils::{bearer_token, parse_user_id};
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{
    LOG_EVENT_TOKEN_REFRESH_FAILED, LOG_EVENT_TOKEN_REFRESH_SUCCESS, LogEventType,
};
use crate::unix_now;

#[utoipa::path(
    post,
    path = "/v1/auth/token/validate",
    request_body = ValidateJwtRequest,
    responses(
        (status = 200, description = "Decoded claims", body = TokenInfos),
        (status = 400, description = "Invalid token", body = String)
    ),
    tag = "auth"
)]
pub async fn validate_jwt(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<ValidateJwtRequest>>,
) -> Result<Json<TokenInfos>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    let claims = deps
        .signer
        .verify(&request.token, unix_now())
        .map_err(|_| ApiError::InvalidArgument("invalid token"))?;

    Ok(Json(TokenInfos {
        id: claims.sub.clone(),
        instance_id: claims.instance_id.clone(),
        profile_id: claims.profile_id.clone(),
        other_profile_ids: claims.other_profile_ids.clone(),
        account_confirmed: claims.account_confirmed,
        payload: claims.payload,
        issued_at: claims.iat,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/token/renew",
    request_body = RenewJwtRequest,
    responses(
        (status = 200, description = "Fresh token pair", body = TokenResponse),
        (status = 400, description = "Wrong refresh token", body = String),
        (status = 403, description = "Wrong access token", body = String)
    ),
    tag = "auth"
)]
pub async fn renew_jwt(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<RenewJwtRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.access_token.is_empty() || request.refresh_token.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    // Renewal is the only place an expired access token is accepted; the
    // refresh token still gates the operation.
    let claims = deps
        .signer
        .verify_allow_expired(&request.access_token)
        .map_err(|err| {
            error!("renew token error: {err}");
            ApiError::NotAuthorized
        })?;

    let user_id = parse_user_id(&claims.sub)?;
    let mut user = deps
        .users
        .get_user_by_id(&claims.instance_id, user_id)
        .await?;

    let now = unix_now();
    if let Err(err) = user.remove_refresh_token(&request.refresh_token, now) {
        error!("renew token error: {err}");
        deps.save_log_event_detached(
            &claims.instance_id,
            &claims.sub,
            LogEventType::Security,
            LOG_EVENT_TOKEN_REFRESH_FAILED,
            "wrong refresh token, cannot renew",
        );
        return Err(err.into());
    }
    user.timestamps.last_token_refresh = now;

    // Claims are preserved across renewal except the fresh timestamps and
    // the confirmation flag.
    let roles = claims.roles();
    let username = claims.username().to_string();
    let (access_token, refresh_token, profile_id) = mint_tokens(
        &deps,
        &claims.instance_id,
        &mut user,
        Some(&claims.profile_id),
        &roles,
        &username,
    )?;
    let user = deps.users.update_user(&claims.instance_id, &user).await?;

    deps.save_log_event_detached(
        &claims.instance_id,
        &claims.sub,
        LogEventType::Log,
        LOG_EVENT_TOKEN_REFRESH_SUCCESS,
        "",
    );

    Ok(Json(token_response(
        &deps,
        &user,
        access_token,
        refresh_token,
        profile_id,
    )))
}

#[utoipa::path(
    post,
    path = "/v1/auth/token/revoke-all",
    responses(
        (status = 200, description = "All refresh tokens revoked", body = ServiceStatus),
        (status = 401, description = "Invalid token", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "auth"
)]
pub async fn revoke_all_refresh_tokens(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
) -> Result<Json<ServiceStatus>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::MissingArgument)?;
    let claims = deps.validate_access_token(&token)?;

    let user_id = parse_user_id(&claims.sub)?;
    let mut user = deps
        .users
        .get_user_by_id(&claims.instance_id, user_id)
        .await?;
    user.account.refresh_tokens.clear();
    deps.users.update_user(&claims.instance_id, &user).await?;

    Ok(Json(ServiceStatus::normal("refresh tokens revoked")))
}

#[cfg(test)]
mod tests {
    use super::{renew_jwt, validate_jwt};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn missing_payloads_are_rejected() {
        let response = validate_jwt(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = renew_jwt(Extension(test_deps()), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn garbage_access_token_is_rejected() {
        let request = serde_json::from_value(serde_json::json!({
            "token": "garbage"
        }))
        .expect("request");
        let response = validate_jwt(Extension(test_deps()), Some(axum::Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn renew_rejects_forged_access_token() {
        let request = serde_json::from_value(serde_json::json!({
            "access_token": "garbage",
            "refresh_token": "some-refresh"
        }))
        .expect("request");
        let response = renew_jwt(Extension(test_deps()), Some(axum::Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
