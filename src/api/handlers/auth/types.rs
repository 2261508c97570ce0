//! Wire types for the auth endpoints.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::api::handlers::types::TokenResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub instance_id: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub preferred_language: String,
    #[serde(default)]
    pub wants_newsletter: bool,
    /// Invitation temp token; bypasses the signup rate cap when valid.
    #[serde(default)]
    pub use_invitation_token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub instance_id: String,
    pub email: String,
    pub password: String,
    /// 6-digit second-factor code, when the first login step asked for one.
    #[serde(default)]
    pub verification_code: Option<String>,
    #[serde(default, rename = "has_2fa")]
    pub has_2fa: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenResponse>,
    /// Set when the caller must repeat the login with a verification code.
    #[serde(default)]
    pub second_factor_needed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendVerificationCodeRequest {
    pub instance_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AutoValidateTempTokenRequest {
    pub token: String,
    pub purpose: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AutoValidateTempTokenResponse {
    pub instance_id: String,
    pub user_id: String,
    pub account_confirmed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyContactRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePasswordResetRequest {
    pub instance_id: String,
    pub account_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetInfosRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetInfosResponse {
    pub account_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateJwtRequest {
    pub token: String,
}

/// Decoded claims, for collaborator services validating a token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenInfos {
    pub id: String,
    pub instance_id: String,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_profile_ids: Vec<String>,
    pub account_confirmed: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub payload: HashMap<String, String>,
    pub issued_at: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenewJwtRequest {
    pub access_token: String,
    pub refresh_token: String,
}
