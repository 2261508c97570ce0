//! Language, contact preferences and newsletter unsubscribe.

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::error;

use super::require_caller;
use super::types::{LanguageChangeRequest, UnsubscribeRequest};
use crate::api::handlers::types::{ContactPreferencesData, ServiceStatus, UserResponse};
use crate::api::handlers::{ApiError, Deps};
use crate::db::temp_tokens::PURPOSE_UNSUBSCRIBE_NEWSLETTER;
use crate::users::ContactPreferences;

#[utoipa::path(
    post,
    path = "/v1/user/language",
    request_body = LanguageChangeRequest,
    responses(
        (status = 200, description = "Language updated", body = UserResponse),
        (status = 400, description = "Validation error", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn change_preferred_language(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<LanguageChangeRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.language_code.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let user = deps
        .users
        .update_preferred_language(&claims.instance_id, caller_id, &request.language_code)
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/contact-preferences",
    request_body = ContactPreferencesData,
    responses(
        (status = 200, description = "Preferences replaced", body = UserResponse),
        (status = 400, description = "Unknown contact info referenced", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "account"
)]
pub async fn update_contact_preferences(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<ContactPreferencesData>>,
) -> Result<Json<UserResponse>, ApiError> {
    let (claims, caller_id) = require_caller(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };

    // Newsletter recipients must reference the caller's own contacts.
    let user = deps
        .users
        .get_user_by_id(&claims.instance_id, caller_id)
        .await
        .map_err(|_| ApiError::Internal("user not found".to_string()))?;
    let preferences: ContactPreferences = request.into();
    for contact_id in &preferences.send_newsletter_to {
        if !user.contact_infos.iter().any(|entry| entry.id == *contact_id) {
            return Err(ApiError::InvalidArgument("invalid contact info id"));
        }
    }

    let user = deps
        .users
        .update_contact_preferences(&claims.instance_id, caller_id, &preferences)
        .await?;
    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/user/unsubscribe",
    request_body = UnsubscribeRequest,
    responses(
        (status = 200, description = "Unsubscribed from the newsletter", body = ServiceStatus),
        (status = 400, description = "Wrong token", body = String)
    ),
    tag = "account"
)]
pub async fn use_unsubscribe_token(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<UnsubscribeRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let token = match deps
        .temp_tokens
        .validate(&request.token, &[PURPOSE_UNSUBSCRIBE_NEWSLETTER])
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("UseUnsubscribeToken: {err}");
            return Err(err.into());
        }
    };

    let mut user = deps
        .users
        .get_user_by_id(&token.instance_id, token.user_id)
        .await?;
    user.contact_preferences.subscribed_to_newsletter = false;

    deps.users
        .update_contact_preferences(&token.instance_id, user.id, &user.contact_preferences)
        .await?;

    Ok(Json(ServiceStatus::normal("unsubscribed")))
}

#[cfg(test)]
mod tests {
    use super::{change_preferred_language, update_contact_preferences, use_unsubscribe_token};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn endpoints_require_bearer_token() {
        let response =
            change_preferred_language(Extension(test_deps()), HeaderMap::new(), None)
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            update_contact_preferences(Extension(test_deps()), HeaderMap::new(), None)
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsubscribe_requires_token() {
        let response = use_unsubscribe_token(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
