//! Password change for an authenticated caller.

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use super::require_caller;
use super::types::PasswordChangeRequest;
use crate::api::handlers::types::ServiceStatus;
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{
    LOG_EVENT_PASSWORD_CHANGED, LOG_EVENT_WRONG_PASSWORD, LogEventType,
};
use crate::collab::messaging::{EMAIL_TYPE_PASSWORD_CHANGED, SendEmailReq};
use crate::crypto::password;
use crate::db::temp_tokens::PURPOSE_PASSWORD_RESET;

#[utoipa::path(
    post,
    path = "/v1/user/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password changed", body = ServiceStatus),
        (status = 400, description = "Wrong old password or weak new one", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn change_password(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<PasswordChangeRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };

    if !password::check_password_format(&request.new_password) {
        return Err(ApiError::InvalidArgument("new password too weak"));
    }

    let user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::InvalidCredentials)?;

    if !password::compare_with_hash(&user.account.password_hash, &request.old_password) {
        deps.save_log_event_detached(
            &claims.instance_id,
            &caller_id.to_string(),
            LogEventType::Security,
            LOG_EVENT_WRONG_PASSWORD,
            "change password endpoint",
        );
        return Err(ApiError::InvalidCredentials);
    }

    let new_hash = password::hash_password(&request.new_password)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    deps.users
        .update_password(&claims.instance_id, caller_id, &new_hash)
        .await?;
    info!("user {} initiated password change", caller_id);

    deps.send_email_detached(SendEmailReq {
        instance_id: claims.instance_id.clone(),
        to: vec![user.account.account_id.clone()],
        message_type: EMAIL_TYPE_PASSWORD_CHANGED.to_string(),
        content_infos: HashMap::new(),
        preferred_language: user.account.preferred_language.clone(),
        use_low_prio: true,
    });

    // A changed password invalidates every outstanding reset link.
    if let Err(err) = deps
        .temp_tokens
        .delete_all_for_user(&claims.instance_id, caller_id, Some(PURPOSE_PASSWORD_RESET))
        .await
    {
        error!("failed to purge password-reset tokens: {err}");
    }

    deps.save_log_event_detached(
        &claims.instance_id,
        &caller_id.to_string(),
        LogEventType::Log,
        LOG_EVENT_PASSWORD_CHANGED,
        "",
    );

    Ok(Json(ServiceStatus::normal("password changed")))
}

#[cfg(test)]
mod tests {
    use super::change_password;
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn requires_bearer_token() {
        let response = change_password(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
