//! Contact verification and 2FA code re-send endpoints.

use axum::Json;
use axum::extract::Extension;
use std::sync::Arc;
use tracing::error;

use super::types::{
    AutoValidateTempTokenRequest, AutoValidateTempTokenResponse, ResendVerificationCodeRequest,
    VerifyContactRequest,
};
use super::{generate_and_send_verification_code, send_verification_code_email};
use crate::api::handlers::types::{ServiceStatus, UserResponse};
use crate::api::handlers::utils::normalize_email;
use crate::api::handlers::{ApiError, Deps};
use crate::db::temp_tokens::{
    PURPOSE_CONTACT_VERIFICATION, PURPOSE_INVITATION, PURPOSE_SURVEY_LOGIN,
    PURPOSE_UNSUBSCRIBE_NEWSLETTER,
};
use crate::unix_now;
use crate::users::CONTACT_TYPE_EMAIL;

#[utoipa::path(
    post,
    path = "/v1/auth/verification-code/resend",
    request_body = ResendVerificationCodeRequest,
    responses(
        (status = 200, description = "Code re-sent when the account exists", body = ServiceStatus),
        (status = 400, description = "Validation error", body = String)
    ),
    tag = "auth"
)]
pub async fn resend_verification_code(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<ResendVerificationCodeRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.email.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.require_instance(&request.instance_id).await?;

    let email = normalize_email(&request.email);
    // Whether the account exists is not revealed.
    let response = ServiceStatus::normal("code sent");
    let Ok(user) = deps
        .users
        .get_user_by_account_id(&request.instance_id, &email)
        .await
    else {
        return Ok(Json(response));
    };

    let now = unix_now();
    let live_code = user
        .account
        .verification_code
        .as_ref()
        .filter(|code| code.expires_at > now)
        .map(|code| code.code.clone());
    match live_code {
        // A still-valid code is re-sent rather than replaced.
        Some(code) => {
            send_verification_code_email(&deps, &request.instance_id, &user, &code);
        }
        None => {
            generate_and_send_verification_code(&deps, &request.instance_id, user).await?;
        }
    }

    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/auth/contact/verify",
    request_body = VerifyContactRequest,
    responses(
        (status = 200, description = "Contact confirmed", body = UserResponse),
        (status = 400, description = "Wrong token", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_contact(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<VerifyContactRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    deps.maybe_sweep_temp_tokens();

    // Invitation links double as first-contact confirmation.
    let token = deps
        .temp_tokens
        .validate(
            &request.token,
            &[PURPOSE_CONTACT_VERIFICATION, PURPOSE_INVITATION],
        )
        .await?;

    let mut user = deps
        .users
        .get_user_by_id(&token.instance_id, token.user_id)
        .await?;

    let email = token
        .info
        .get("email")
        .cloned()
        .unwrap_or_else(|| user.account.account_id.clone());
    let contact_id = user
        .find_contact_info_by_type_and_addr(CONTACT_TYPE_EMAIL, &email)
        .map(|contact| contact.id)
        .ok_or(ApiError::Internal("contact info not found".to_string()))?;
    user.confirm_contact_info(contact_id, unix_now())?;

    let user = deps.users.update_user(&token.instance_id, &user).await?;

    if let Err(err) = deps.temp_tokens.delete(&request.token).await {
        error!("failed to delete used contact-verification token: {err}");
    }

    Ok(Json(UserResponse::from(&user)))
}

#[utoipa::path(
    post,
    path = "/v1/auth/temp-token/auto-validate",
    request_body = AutoValidateTempTokenRequest,
    responses(
        (status = 200, description = "Token resolved", body = AutoValidateTempTokenResponse),
        (status = 400, description = "Wrong token", body = String)
    ),
    tag = "auth"
)]
pub async fn auto_validate_temp_token(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<AutoValidateTempTokenRequest>>,
) -> Result<Json<AutoValidateTempTokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() || request.purpose.is_empty() {
        return Err(ApiError::MissingArgument);
    }
    // Only purposes meant for email-link logins may auto-validate.
    if ![
        PURPOSE_SURVEY_LOGIN,
        PURPOSE_UNSUBSCRIBE_NEWSLETTER,
        PURPOSE_CONTACT_VERIFICATION,
    ]
    .contains(&request.purpose.as_str())
    {
        return Err(ApiError::WrongToken);
    }
    deps.maybe_sweep_temp_tokens();

    let token = deps
        .temp_tokens
        .validate(&request.token, &[request.purpose.as_str()])
        .await?;

    let user = deps
        .users
        .get_user_by_id(&token.instance_id, token.user_id)
        .await?;

    Ok(Json(AutoValidateTempTokenResponse {
        instance_id: token.instance_id,
        user_id: user.id.to_string(),
        account_confirmed: user.account.account_confirmed_at > 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::{auto_validate_temp_token, resend_verification_code, verify_contact};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn missing_payloads_are_rejected() {
        let response = resend_verification_code(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = verify_contact(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = auto_validate_temp_token(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn auto_validate_rejects_foreign_purposes() {
        let request = serde_json::from_value(serde_json::json!({
            "token": "some-token",
            "purpose": "password-reset"
        }))
        .expect("request");
        let response =
            auto_validate_temp_token(Extension(test_deps()), Some(axum::Json(request)))
                .await
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
