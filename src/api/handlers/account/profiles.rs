//! Profile CRUD under one account.

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use std::sync::Arc;
use uuid::Uuid;

use super::require_caller;
use super::types::{ProfileInput, RemoveProfileRequest, SaveProfileRequest};
use crate::api::handlers::types::UserResponse;
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{
    LOG_EVENT_PROFILE_REMOVED, LOG_EVENT_PROFILE_SAVED, LogEventType,
};
use crate::unix_now;
use crate::users::{MAX_PROFILES, Profile};

#[utoipa::path(
    post,
    path = "/v1/user/profiles/save",
    request_body = SaveProfileRequest,
    responses(
        (status = 200, description = "Profile added or updated", body = UserResponse),
        (status = 500, description = "Profile limit reached or unknown id", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn save_profile(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<SaveProfileRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.profile.alias.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let mut user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::Internal("user not found".to_string()))?;

    let alias = request.profile.alias.clone();
    match request.profile.id {
        None => {
            if user.profiles.len() >= MAX_PROFILES {
                deps.save_log_event_detached(
                    &claims.instance_id,
                    &caller_id.to_string(),
                    LogEventType::Security,
                    LOG_EVENT_PROFILE_SAVED,
                    &format!("too many profiles added {alias}"),
                );
                return Err(ApiError::Internal("reached profile limit".to_string()));
            }
            user.add_profile(profile_from_input(request.profile, Uuid::new_v4()));
        }
        Some(id) => {
            user.update_profile(profile_from_input(request.profile, id))
                .map_err(|_| ApiError::Internal("profile not found".to_string()))?;
        }
    }

    let user = deps.users.update_user(&claims.instance_id, &user).await?;

    deps.save_log_event_detached(
        &claims.instance_id,
        &caller_id.to_string(),
        LogEventType::Log,
        LOG_EVENT_PROFILE_SAVED,
        &alias,
    );

    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/profiles/remove",
    request_body = RemoveProfileRequest,
    responses(
        (status = 200, description = "Profile removed", body = UserResponse),
        (status = 500, description = "Last profile cannot be removed", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn remove_profile(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<RemoveProfileRequest>>,
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

    user.remove_profile(request.profile_id)?;

    let user = deps.users.update_user(&claims.instance_id, &user).await?;

    deps.save_log_event_detached(
        &claims.instance_id,
        &caller_id.to_string(),
        LogEventType::Log,
        LOG_EVENT_PROFILE_REMOVED,
        &format!("id: {}", request.profile_id),
    );

    Ok(Json(UserResponse::from(&user)))
}

fn profile_from_input(input: ProfileInput, id: Uuid) -> Profile {
    Profile {
        id,
        alias: input.alias,
        avatar_id: input.avatar_id,
        consent_confirmed_at: input.consent_confirmed_at,
        main_profile: input.main_profile,
        created_at: unix_now(),
    }
}

#[cfg(test)]
mod tests {
    use super::{remove_profile, save_profile};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn endpoints_require_bearer_token() {
        let response = save_profile(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = remove_profile(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
