//! Wire types for the account-management endpoints.

use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailChangeRequest {
    pub new_email: String,
    /// Current password; the account id cannot change without it.
    pub password: String,
    #[serde(default)]
    pub keep_old_email: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LanguageChangeRequest {
    pub language_code: String,
}

/// A profile to create (no id) or update (existing id).
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub alias: String,
    #[serde(default)]
    pub avatar_id: Option<String>,
    #[serde(default)]
    pub consent_confirmed_at: i64,
    #[serde(default)]
    pub main_profile: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveProfileRequest {
    pub profile: ProfileInput,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveProfileRequest {
    pub profile_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UnsubscribeRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveEmailRequest {
    pub contact_info_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteAccountRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GetUserParams {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}
