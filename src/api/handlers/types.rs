//! Wire types shared across the auth and account endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::users::{ContactInfo, ContactPreferences, Profile, Timestamps, User};

/// Generic status payload for endpoints without a richer response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceStatus {
    pub status: String,
    pub msg: String,
}

impl ServiceStatus {
    #[must_use]
    pub fn normal(msg: &str) -> Self {
        Self {
            status: "NORMAL".to_string(),
            msg: msg.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileData {
    pub id: Uuid,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<String>,
    #[serde(default)]
    pub consent_confirmed_at: i64,
    #[serde(default)]
    pub main_profile: bool,
    #[serde(default)]
    pub created_at: i64,
}

impl From<&Profile> for ProfileData {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            alias: profile.alias.clone(),
            avatar_id: profile.avatar_id.clone(),
            consent_confirmed_at: profile.consent_confirmed_at,
            main_profile: profile.main_profile,
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactInfoData {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub contact_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default)]
    pub confirmed_at: i64,
}

impl From<&ContactInfo> for ContactInfoData {
    fn from(contact: &ContactInfo) -> Self {
        Self {
            id: contact.id,
            contact_type: contact.contact_type.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            confirmed_at: contact.confirmed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactPreferencesData {
    #[serde(default)]
    pub subscribed_to_newsletter: bool,
    #[serde(default)]
    pub send_newsletter_to: Vec<Uuid>,
    #[serde(default)]
    pub receive_weekly_message_day_of_week: i32,
    #[serde(default)]
    pub subscribed_to_weekly: bool,
}

impl From<&ContactPreferences> for ContactPreferencesData {
    fn from(preferences: &ContactPreferences) -> Self {
        Self {
            subscribed_to_newsletter: preferences.subscribed_to_newsletter,
            send_newsletter_to: preferences.send_newsletter_to.clone(),
            receive_weekly_message_day_of_week: preferences.receive_weekly_message_day_of_week,
            subscribed_to_weekly: preferences.subscribed_to_weekly,
        }
    }
}

impl From<ContactPreferencesData> for ContactPreferences {
    fn from(data: ContactPreferencesData) -> Self {
        Self {
            subscribed_to_newsletter: data.subscribed_to_newsletter,
            send_newsletter_to: data.send_newsletter_to,
            receive_weekly_message_day_of_week: data.receive_weekly_message_day_of_week,
            subscribed_to_weekly: data.subscribed_to_weekly,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountData {
    #[serde(rename = "type")]
    pub account_type: String,
    pub account_id: String,
    pub account_confirmed_at: i64,
    pub preferred_language: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TimestampsData {
    pub created_at: i64,
    pub updated_at: i64,
    pub last_login: i64,
    pub last_token_refresh: i64,
    pub marked_for_deletion: i64,
}

/// The user aggregate as exposed to clients: credentials, lockout
/// bookkeeping and refresh tokens are stripped.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub account: AccountData,
    pub roles: Vec<String>,
    pub profiles: Vec<ProfileData>,
    pub contact_infos: Vec<ContactInfoData>,
    pub contact_preferences: ContactPreferencesData,
    pub timestamps: TimestampsData,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        let Timestamps {
            created_at,
            updated_at,
            last_login,
            last_token_refresh,
            marked_for_deletion,
            ..
        } = user.timestamps;
        Self {
            id: user.id,
            account: AccountData {
                account_type: user.account.account_type.clone(),
                account_id: user.account.account_id.clone(),
                account_confirmed_at: user.account.account_confirmed_at,
                preferred_language: user.account.preferred_language.clone(),
            },
            roles: user.roles.clone(),
            profiles: user.profiles.iter().map(ProfileData::from).collect(),
            contact_infos: user.contact_infos.iter().map(ContactInfoData::from).collect(),
            contact_preferences: ContactPreferencesData::from(&user.contact_preferences),
            timestamps: TimestampsData {
                created_at,
                updated_at,
                last_login,
                last_token_refresh,
                marked_for_deletion,
            },
        }
    }
}

/// Session token pair handed out on signup, login and renewal.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in minutes.
    pub expires_in: i64,
    pub selected_profile_id: String,
    pub profiles: Vec<ProfileData>,
    pub account_confirmed: bool,
    pub preferred_language: String,
}

#[cfg(test)]
mod tests {
    use super::UserResponse;
    use crate::users::User;

    #[test]
    fn user_response_strips_credentials() {
        let user =
            User::new_email_user("alice@example.org", "$argon2id$secret", "en", true, 1, 1_000);
        let response = UserResponse::from(&user);
        let json = serde_json::to_value(&response).expect("encode");
        assert!(json.get("account").is_some());
        assert!(json["account"].get("password_hash").is_none());
        assert!(json["account"].get("refresh_tokens").is_none());
        assert!(json["account"].get("failed_login_attempts").is_none());
        assert_eq!(json["account"]["account_id"], "alice@example.org");
        assert_eq!(json["profiles"][0]["alias"], "alice");
    }
}
