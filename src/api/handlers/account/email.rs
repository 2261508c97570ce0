//! Account-id (login email) change and secondary contact management.

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use super::require_caller;
use super::types::{AddEmailRequest, EmailChangeRequest, RemoveEmailRequest};
use crate::api::handlers::auth::start_contact_verification;
use crate::api::handlers::types::{ServiceStatus, UserResponse};
use crate::api::handlers::utils::{normalize_email, valid_email};
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{
    LOG_EVENT_ACCOUNT_ID_CHANGED, LOG_EVENT_WRONG_PASSWORD, LogEventType,
};
use crate::collab::messaging::{
    EMAIL_TYPE_ACCOUNT_ID_CHANGED, EMAIL_TYPE_VERIFY_EMAIL, SendEmailReq,
};
use crate::crypto::password;
use crate::db::temp_tokens::{PURPOSE_RESTORE_ACCOUNT_ID, TempToken};
use crate::unix_now;
use crate::users::{ACCOUNT_TYPE_EMAIL, CONTACT_TYPE_EMAIL};

/// Restore links for a changed account id stay valid for a week.
const RESTORE_TOKEN_LIFETIME: i64 = 7 * 24 * 60 * 60;

#[utoipa::path(
    post,
    path = "/v1/user/account-id",
    request_body = EmailChangeRequest,
    responses(
        (status = 200, description = "Account id swapped", body = UserResponse),
        (status = 400, description = "Validation error or wrong password", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn change_account_id_email(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<EmailChangeRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.new_email.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let new_email = normalize_email(&request.new_email);
    if !valid_email(&new_email) {
        return Err(ApiError::InvalidArgument("email not valid"));
    }

    let mut user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::Internal("user not found".to_string()))?;

    // The account id cannot move without the current password.
    if !password::compare_with_hash(&user.account.password_hash, &request.password) {
        deps.save_log_event_detached(
            &claims.instance_id,
            &caller_id.to_string(),
            LogEventType::Security,
            LOG_EVENT_WRONG_PASSWORD,
            "change account id endpoint",
        );
        return Err(ApiError::InvalidArgument("action failed"));
    }

    // A bare existence check; the response does not distinguish this case.
    if deps
        .users
        .get_user_by_account_id(&claims.instance_id, &new_email)
        .await
        .is_ok()
    {
        return Err(ApiError::Internal("action failed".to_string()));
    }

    if user.account.account_type != ACCOUNT_TYPE_EMAIL {
        return Err(ApiError::Internal("account is not email type".to_string()));
    }

    let old_email = user.account.account_id.clone();
    let old_contact_id = user
        .find_contact_info_by_type_and_addr(CONTACT_TYPE_EMAIL, &old_email)
        .map(|contact| contact.id)
        .ok_or(ApiError::Internal(
            "old contact info not found - unexpected error".to_string(),
        ))?;

    if user.account.account_confirmed_at > 0 {
        // The old, confirmed address gets a window to undo the change.
        let restore_token = deps
            .temp_tokens
            .add(TempToken::new(
                user.id,
                &claims.instance_id,
                PURPOSE_RESTORE_ACCOUNT_ID,
                HashMap::from([
                    ("oldEmail".to_string(), old_email.clone()),
                    ("newEmail".to_string(), new_email.clone()),
                ]),
                unix_now() + RESTORE_TOKEN_LIFETIME,
            ))
            .await?;

        deps.send_email_detached(SendEmailReq {
            instance_id: claims.instance_id.clone(),
            to: vec![old_email.clone()],
            message_type: EMAIL_TYPE_ACCOUNT_ID_CHANGED.to_string(),
            content_infos: HashMap::from([
                ("restoreToken".to_string(), restore_token),
                (
                    "validUntil".to_string(),
                    (RESTORE_TOKEN_LIFETIME / 60).to_string(),
                ),
                ("newEmail".to_string(), new_email.clone()),
            ]),
            preferred_language: user.account.preferred_language.clone(),
            use_low_prio: true,
        });
    }

    // An unconfirmed old id was probably a typo in the first place.
    if user.profiles[0].alias == old_email {
        user.profiles[0].alias = new_email.clone();
    }
    user.account.account_id = new_email.clone();
    user.account.account_confirmed_at = -1;

    let now = unix_now();
    let existing_confirmed_at = user
        .find_contact_info_by_type_and_addr(CONTACT_TYPE_EMAIL, &new_email)
        .map(|contact| contact.confirmed_at);
    match existing_confirmed_at {
        // The new address was already confirmed as a secondary contact.
        Some(confirmed_at) if confirmed_at > 0 => {
            user.account.account_confirmed_at = confirmed_at;
        }
        Some(_) => {}
        None => {
            user.add_new_email(&new_email, false, now);
        }
    }

    let new_contact_id = user
        .find_contact_info_by_type_and_addr(CONTACT_TYPE_EMAIL, &new_email)
        .map(|contact| contact.id)
        .ok_or(ApiError::Internal(
            "new contact info not found - unexpected error".to_string(),
        ))?;
    user.replace_contact_info_in_contact_preferences(old_contact_id, new_contact_id);

    if user.account.account_confirmed_at <= 0 {
        start_contact_verification(
            &deps,
            &claims.instance_id,
            &user,
            &new_email,
            EMAIL_TYPE_VERIFY_EMAIL,
        )
        .await?;
    }

    if !request.keep_old_email {
        if let Err(err) = user.remove_contact_info(old_contact_id) {
            error!("{err}");
        }
    }

    let user = deps.users.update_user(&claims.instance_id, &user).await?;

    deps.save_log_event_detached(
        &claims.instance_id,
        &user.id.to_string(),
        LogEventType::Log,
        LOG_EVENT_ACCOUNT_ID_CHANGED,
        &user.account.account_id,
    );

    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/contacts/add-email",
    request_body = AddEmailRequest,
    responses(
        (status = 200, description = "Contact added, verification started", body = UserResponse),
        (status = 400, description = "Validation error", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn add_email(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<AddEmailRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::InvalidArgument("email not valid"));
    }

    let mut user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::Internal("user not found".to_string()))?;

    user.add_new_email(&email, false, unix_now());

    start_contact_verification(
        &deps,
        &claims.instance_id,
        &user,
        &email,
        EMAIL_TYPE_VERIFY_EMAIL,
    )
    .await?;

    let user = deps.users.update_user(&claims.instance_id, &user).await?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/contacts/remove-email",
    request_body = RemoveEmailRequest,
    responses(
        (status = 200, description = "Contact removed", body = UserResponse),
        (status = 500, description = "Primary email cannot be removed", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn remove_email(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<RemoveEmailRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };

    let mut user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::Internal("user not found".to_string()))?;

    user.remove_contact_info(request.contact_info_id)?;

    let user = deps.users.update_user(&claims.instance_id, &user).await?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/contact-verification/resend",
    responses(
        (status = 200, description = "Verification email re-sent", body = ServiceStatus),
        (status = 401, description = "Invalid token", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn resend_contact_verification(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
) -> Result<Json<ServiceStatus>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;

    let user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::Internal("user not found".to_string()))?;

    let email = user.account.account_id.clone();
    start_contact_verification(
        &deps,
        &claims.instance_id,
        &user,
        &email,
        EMAIL_TYPE_VERIFY_EMAIL,
    )
    .await?;

    Ok(Json(ServiceStatus::normal("verification email sent")))
}

#[cfg(test)]
mod tests {
    use super::{add_email, change_account_id_email, remove_email};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn endpoints_require_bearer_token() {
        let response = change_account_id_email(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = add_email(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = remove_email(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
