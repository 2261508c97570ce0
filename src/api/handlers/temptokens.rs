//! Temp-token CRUD endpoints, used by collaborator services to drive
//! out-of-band flows (invitations, survey logins, unsubscribe links).

use axum::Json;
use axum::extract::Extension;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::ServiceStatus;
use super::{ApiError, Deps};
use crate::db::temp_tokens::{PURPOSE_INVITATION, TempToken};
use crate::unix_now;

/// Invitation tokens issued without an explicit expiry get the configured
/// invitation lifetime; everything else falls back to the store default.
fn default_expiration(deps: &Deps, purpose: &str, expiration: i64) -> i64 {
    if expiration == 0 && purpose == PURPOSE_INVITATION {
        return unix_now() + deps.config.invitation_token_lifetime;
    }
    expiration
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TempTokenInfoRequest {
    pub user_id: Uuid,
    pub instance_id: String,
    pub purpose: String,
    #[serde(default)]
    pub info: HashMap<String, String>,
    /// Absolute unix second; 0 selects the default lifetime.
    #[serde(default)]
    pub expiration: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TempTokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TempTokenData {
    pub token: String,
    pub user_id: Uuid,
    pub instance_id: String,
    pub purpose: String,
    pub info: HashMap<String, String>,
    pub expires_at: i64,
}

impl From<TempToken> for TempTokenData {
    fn from(token: TempToken) -> Self {
        Self {
            token: token.token,
            user_id: token.user_id,
            instance_id: token.instance_id,
            purpose: token.purpose,
            info: token.info,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TempTokenList {
    pub temp_tokens: Vec<TempTokenData>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteTempTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PurgeTempTokensRequest {
    pub instance_id: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListTempTokensRequest {
    pub instance_id: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/temp-token",
    request_body = TempTokenInfoRequest,
    responses(
        (status = 200, description = "Token created", body = TempTokenResponse),
        (status = 400, description = "Missing argument", body = String)
    ),
    tag = "temp-token"
)]
pub async fn generate_temp_token(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<TempTokenInfoRequest>>,
) -> Result<Json<TempTokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.purpose.is_empty() || request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.maybe_sweep_temp_tokens();

    let expiration = default_expiration(&deps, &request.purpose, request.expiration);
    let token = deps
        .temp_tokens
        .add(TempToken::new(
            request.user_id,
            &request.instance_id,
            &request.purpose,
            request.info,
            expiration,
        ))
        .await?;
    Ok(Json(TempTokenResponse { token }))
}

#[utoipa::path(
    post,
    path = "/v1/temp-token/get-or-create",
    request_body = TempTokenInfoRequest,
    responses(
        (status = 200, description = "Existing token reused or a new one created", body = TempTokenResponse),
        (status = 400, description = "Missing argument", body = String)
    ),
    tag = "temp-token"
)]
pub async fn get_or_create_temp_token(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<TempTokenInfoRequest>>,
) -> Result<Json<TempTokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.purpose.is_empty() || request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.maybe_sweep_temp_tokens();

    let existing = deps
        .temp_tokens
        .get_for_user(
            &request.instance_id,
            request.user_id,
            Some(request.purpose.as_str()),
        )
        .await?;
    if let Some(first) = existing.into_iter().next() {
        return Ok(Json(TempTokenResponse { token: first.token }));
    }

    let expiration = default_expiration(&deps, &request.purpose, request.expiration);
    let token = deps
        .temp_tokens
        .add(TempToken::new(
            request.user_id,
            &request.instance_id,
            &request.purpose,
            request.info,
            expiration,
        ))
        .await?;
    Ok(Json(TempTokenResponse { token }))
}

#[utoipa::path(
    post,
    path = "/v1/temp-token/list",
    request_body = ListTempTokensRequest,
    responses(
        (status = 200, description = "The user's tokens", body = TempTokenList),
        (status = 400, description = "Missing argument", body = String)
    ),
    tag = "temp-token"
)]
pub async fn get_temp_tokens(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<ListTempTokensRequest>>,
) -> Result<Json<TempTokenList>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let tokens = deps
        .temp_tokens
        .get_for_user(
            &request.instance_id,
            request.user_id,
            request.purpose.as_deref().filter(|p| !p.is_empty()),
        )
        .await?;
    Ok(Json(TempTokenList {
        temp_tokens: tokens.into_iter().map(TempTokenData::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/temp-token/delete",
    request_body = DeleteTempTokenRequest,
    responses(
        (status = 200, description = "Token removed", body = ServiceStatus),
        (status = 400, description = "Missing argument", body = String)
    ),
    tag = "temp-token"
)]
pub async fn delete_temp_token(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<DeleteTempTokenRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.temp_tokens.delete(&request.token).await?;
    Ok(Json(ServiceStatus::normal("deleted")))
}

#[utoipa::path(
    post,
    path = "/v1/temp-token/purge",
    request_body = PurgeTempTokensRequest,
    responses(
        (status = 200, description = "User's tokens removed", body = ServiceStatus),
        (status = 400, description = "Missing argument", body = String)
    ),
    tag = "temp-token"
)]
pub async fn purge_user_temp_tokens(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<PurgeTempTokensRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.temp_tokens
        .delete_all_for_user(
            &request.instance_id,
            request.user_id,
            request.purpose.as_deref().filter(|p| !p.is_empty()),
        )
        .await?;
    Ok(Json(ServiceStatus::normal("deleted")))
}

#[cfg(test)]
mod tests {
    use super::{delete_temp_token, generate_temp_token, get_or_create_temp_token};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn missing_payloads_are_rejected() {
        let response = generate_temp_token(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get_or_create_temp_token(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = delete_temp_token(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn purpose_is_required() {
        let request = serde_json::from_value(serde_json::json!({
            "user_id": "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            "instance_id": "inst1",
            "purpose": ""
        }))
        .expect("request");
        let response = generate_temp_token(Extension(test_deps()), Some(axum::Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
