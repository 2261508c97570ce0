//! Signup endpoint.

use axum::Json;
use axum::extract::Extension;
use axum::http::StatusCode;
use rand::Rng;
use std::sync::Arc;
use tracing::error;

use super::types::SignupRequest;
use super::{mint_tokens, start_contact_verification, token_response};
use crate::api::handlers::types::TokenResponse;
use crate::api::handlers::utils::{normalize_email, valid_email};
use crate::api::handlers::{ApiError, Deps};
use crate::collab::logging::{LOG_EVENT_SIGNUP, LogEventType};
use crate::collab::messaging::EMAIL_TYPE_REGISTRATION;
use crate::crypto::password;
use crate::db::StoreError;
use crate::db::temp_tokens::PURPOSE_INVITATION;
use crate::unix_now;
use crate::users::User;

/// Window for the signup rate cap.
const NEW_USER_COUNT_WINDOW: i64 = 60 * 60;

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 429, description = "Signup rate cap reached", body = String)
    ),
    tag = "auth"
)]
pub async fn signup_with_email(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::InvalidArgument("email not valid"));
    }
    if !password::check_password_format(&request.password) {
        return Err(ApiError::InvalidArgument("password too weak"));
    }
    deps.require_instance(&request.instance_id).await?;

    // The hourly cap only yields to a valid invitation token.
    let invitation_token = request
        .use_invitation_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty());
    let mut consumed_invitation = None;
    let recent = deps
        .users
        .count_recently_created(&request.instance_id, NEW_USER_COUNT_WINDOW)
        .await?;
    if recent >= deps.config.new_user_count_limit {
        let Some(token_string) = invitation_token else {
            return Err(ApiError::RateLimited);
        };
        let invitation = deps
            .temp_tokens
            .validate(token_string, &[PURPOSE_INVITATION])
            .await?;
        if invitation.instance_id != request.instance_id {
            return Err(ApiError::WrongToken);
        }
        consumed_invitation = Some(token_string.to_string());
    }

    let password_hash = password::hash_password(&request.password)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    // Spread weekly emails over the week at signup time.
    let weekday = rand::thread_rng().gen_range(0..7);
    let mut user = User::new_email_user(
        &email,
        &password_hash,
        &request.preferred_language,
        request.wants_newsletter,
        weekday,
        unix_now(),
    );

    user.id = match deps.users.add_user(&request.instance_id, &user).await {
        Ok(id) => id,
        Err(StoreError::AlreadyExists) => {
            return Err(ApiError::InvalidArgument("user already exists"));
        }
        Err(err) => return Err(err.into()),
    };

    // Invitation tokens are single-use.
    if let Some(token_string) = consumed_invitation {
        if let Err(err) = deps.temp_tokens.delete(&token_string).await {
            error!("failed to consume invitation token: {err}");
        }
    }

    let roles = user.roles.clone();
    let (access_token, refresh_token, profile_id) =
        mint_tokens(&deps, &request.instance_id, &mut user, None, &roles, &email)?;
    let user = deps.users.update_user(&request.instance_id, &user).await?;

    start_contact_verification(
        &deps,
        &request.instance_id,
        &user,
        &email,
        EMAIL_TYPE_REGISTRATION,
    )
    .await?;

    deps.save_log_event_detached(
        &request.instance_id,
        &user.id.to_string(),
        LogEventType::Log,
        LOG_EVENT_SIGNUP,
        &email,
    );

    Ok((
        StatusCode::CREATED,
        Json(token_response(
            &deps,
            &user,
            access_token,
            refresh_token,
            profile_id,
        )),
    ))
}

#[cfg(test)]
mod tests {
    use super::signup_with_email;
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn missing_payload_is_rejected() {
        let response = signup_with_email(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let request = serde_json::from_value(serde_json::json!({
            "instance_id": "inst1",
            "email": "not-an-email",
            "password": "P@ssw0rd-1"
        }))
        .expect("request");
        let response = signup_with_email(Extension(test_deps()), Some(axum::Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let request = serde_json::from_value(serde_json::json!({
            "instance_id": "inst1",
            "email": "alice@example.org",
            "password": "weakpass"
        }))
        .expect("request");
        let response = signup_with_email(Extension(test_deps()), Some(axum::Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
