//! Read and delete the caller's account.

use axum::Json;
use axum::extract::{Extension, Query};
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::require_caller;
use super::types::{DeleteAccountRequest, GetUserParams};
use crate::api::handlers::types::{ServiceStatus, UserResponse};
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{LOG_EVENT_ACCOUNT_DELETED, LogEventType};
use crate::collab::messaging::{EMAIL_TYPE_ACCOUNT_DELETED, SendEmailReq};
use std::collections::HashMap;

#[utoipa::path(
    get,
    path = "/v1/user",
    params(("user_id" = Option<Uuid>, Query, description = "Defaults to the token owner")),
    responses(
        (status = 200, description = "The caller's account", body = UserResponse),
        (status = 403, description = "Token identity does not match", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn get_user(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    params: Query<GetUserParams>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let target_id = params.user_id.unwrap_or(caller_id);

    // Admin overrides may land here later; for now only self-access.
    if target_id != caller_id {
        warn!(
            "SECURITY WARNING: not authorized GetUser(): {} tried to access {}",
            caller_id, target_id
        );
        return Err(ApiError::NotAuthorized);
    }

    let user = deps
        .users
        .get_user_by_id(&claims.instance_id, target_id)
        .await
        .map_err(|_| ApiError::Internal("not found".to_string()))?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/delete",
    request_body = DeleteAccountRequest,
    responses(
        (status = 200, description = "Account removed", body = ServiceStatus),
        (status = 403, description = "Token identity does not match", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn delete_account(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<DeleteAccountRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };

    if request.user_id != caller_id {
        warn!(
            "unauthorized request: user {} initiated account removal for user id {}",
            caller_id, request.user_id
        );
        return Err(ApiError::NotAuthorized);
    }
    info!(
        "user {} initiated account removal for user id {}",
        caller_id, request.user_id
    );

    let user = deps
        .users
        .get_user_by_id(&claims.instance_id, request.user_id)
        .await?;

    // The goodbye email goes out before the address is gone.
    deps.send_email_detached(SendEmailReq {
        instance_id: claims.instance_id.clone(),
        to: vec![user.account.account_id.clone()],
        message_type: EMAIL_TYPE_ACCOUNT_DELETED.to_string(),
        content_infos: HashMap::new(),
        preferred_language: user.account.preferred_language.clone(),
        use_low_prio: true,
    });

    deps.users
        .delete_user(&claims.instance_id, request.user_id)
        .await?;

    if let Err(err) = deps
        .temp_tokens
        .delete_all_for_user(&claims.instance_id, request.user_id, None)
        .await
    {
        error!("error when trying to remove temp-tokens: {err}");
    }

    deps.save_log_event_detached(
        &claims.instance_id,
        &caller_id.to_string(),
        LogEventType::Log,
        LOG_EVENT_ACCOUNT_DELETED,
        &user.account.account_id,
    );

    info!("user account with id {} successfully removed", request.user_id);
    Ok(Json(ServiceStatus::normal("user deleted")))
}

#[cfg(test)]
mod tests {
    use super::{GetUserParams, delete_account, get_user};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::{Extension, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn get_user_requires_auth() {
        let response = get_user(
            Extension(test_deps()),
            HeaderMap::new(),
            Query(GetUserParams { user_id: None }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_account_requires_auth() {
        let response = delete_account(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
