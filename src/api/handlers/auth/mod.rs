//! Signup, login, token and out-of-band verification endpoints.

pub mod login;
pub mod password_reset;
pub mod signup;
pub mod tokens;
pub mod types;
pub mod verification;

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use super::{ApiError, Deps};
use crate::api::handlers::types::{ProfileData, TokenResponse};
use crate::collab::messaging::{EMAIL_TYPE_VERIFICATION_CODE, SendEmailReq};
use crate::crypto::jwt::Claims;
use crate::crypto::random;
use crate::db::temp_tokens::{PURPOSE_CONTACT_VERIFICATION, TempToken};
use crate::unix_now;
use crate::users::{CONTACT_TYPE_EMAIL, REFRESH_TOKEN_TTL, User, VerificationCode};

pub(crate) const VERIFICATION_CODE_DIGITS: usize = 6;
pub(crate) const VERIFICATION_CODE_MAX_ATTEMPTS: i64 = 3;

/// Mint an access/refresh token pair for a user.
///
/// The refresh token is appended to the aggregate (FIFO device slots); the
/// caller persists the user afterwards.
pub(crate) fn mint_tokens(
    deps: &Deps,
    instance_id: &str,
    user: &mut User,
    selected_profile_id: Option<&str>,
    roles: &[String],
    username: &str,
) -> Result<(String, String, String), ApiError> {
    let now = unix_now();
    let (main_profile_id, other_profile_ids) = user.main_and_other_profile_ids();
    let profile_id = selected_profile_id
        .filter(|id| !id.is_empty())
        .map_or(main_profile_id, str::to_string);

    let claims = Claims::new(
        &user.id.to_string(),
        instance_id,
        &profile_id,
        other_profile_ids,
        user.account.account_confirmed_at > 0,
        roles,
        username,
        None,
        now,
        deps.config.token_expiry_min * 60,
    );
    let access_token = deps
        .signer
        .sign(&claims)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let refresh_token =
        random::unique_token().map_err(|err| ApiError::Internal(err.to_string()))?;
    user.add_refresh_token(&refresh_token, now + REFRESH_TOKEN_TTL);

    Ok((access_token, refresh_token, profile_id))
}

pub(crate) fn token_response(
    deps: &Deps,
    user: &User,
    access_token: String,
    refresh_token: String,
    selected_profile_id: String,
) -> TokenResponse {
    TokenResponse {
        access_token,
        refresh_token,
        expires_in: deps.config.token_expiry_min,
        selected_profile_id,
        profiles: user.profiles.iter().map(ProfileData::from).collect(),
        account_confirmed: user.account.account_confirmed_at > 0,
        preferred_language: user.account.preferred_language.clone(),
    }
}

/// Create a verification code on the user, persist it and email it out.
pub(crate) async fn generate_and_send_verification_code(
    deps: &Deps,
    instance_id: &str,
    mut user: User,
) -> Result<(), ApiError> {
    let code = random::verification_code(VERIFICATION_CODE_DIGITS)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let now = unix_now();
    user.account.verification_code = Some(VerificationCode {
        code: code.clone(),
        attempts: 0,
        created_at: now,
        expires_at: now + deps.config.verification_code_lifetime,
    });
    let user = deps.users.update_user(instance_id, &user).await?;
    send_verification_code_email(deps, instance_id, &user, &code);
    Ok(())
}

pub(crate) fn send_verification_code_email(
    deps: &Deps,
    instance_id: &str,
    user: &User,
    code: &str,
) {
    deps.send_email_detached(SendEmailReq {
        instance_id: instance_id.to_string(),
        to: vec![user.account.account_id.clone()],
        message_type: EMAIL_TYPE_VERIFICATION_CODE.to_string(),
        content_infos: [(
            "verificationCode".to_string(),
            random::format_verification_code(code),
        )]
        .into(),
        preferred_language: user.account.preferred_language.clone(),
        use_low_prio: false,
    });
}

/// Issue a contact-verification temp token and email the confirmation link.
///
/// Used by signup, account-id change, added contacts and reminder re-sends;
/// `message_type` selects the template.
pub(crate) async fn start_contact_verification(
    deps: &Deps,
    instance_id: &str,
    user: &User,
    email: &str,
    message_type: &str,
) -> Result<(), ApiError> {
    let token = deps
        .temp_tokens
        .add(TempToken::new(
            user.id,
            instance_id,
            PURPOSE_CONTACT_VERIFICATION,
            HashMap::from([
                ("type".to_string(), CONTACT_TYPE_EMAIL.to_string()),
                ("email".to_string(), email.to_string()),
            ]),
            unix_now() + deps.config.contact_verification_token_lifetime,
        ))
        .await?;

    deps.send_email_detached(SendEmailReq {
        instance_id: instance_id.to_string(),
        to: vec![email.to_string()],
        message_type: message_type.to_string(),
        content_infos: [("token".to_string(), token)].into(),
        preferred_language: user.account.preferred_language.clone(),
        use_low_prio: false,
    });
    Ok(())
}

/// Compare a submitted verification code against the stored one without a
/// data-dependent early exit: both sides are hashed first.
pub(crate) fn verification_code_matches(submitted: &str, stored: &str) -> bool {
    Sha256::digest(submitted.as_bytes()) == Sha256::digest(stored.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::verification_code_matches;

    #[test]
    fn code_comparison_is_exact() {
        assert!(verification_code_matches("123456", "123456"));
        assert!(!verification_code_matches("123457", "123456"));
        assert!(!verification_code_matches("12345", "123456"));
        assert!(!verification_code_matches("", "123456"));
    }
}
