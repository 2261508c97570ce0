use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{
    ACCOUNT_TYPE_EMAIL, CONTACT_TYPE_EMAIL, REFRESH_TOKEN_SLOTS, ROLE_PARTICIPANT,
};

const LOGIN_BLOCK_WINDOW: i64 = 5 * 60;
const LOGIN_BLOCK_THRESHOLD: usize = 5;
const PASSWORD_RESET_WINDOW: i64 = 60 * 60;
const PASSWORD_RESET_THRESHOLD: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogicError {
    #[error("wrong refresh token")]
    WrongRefreshToken,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("can't delete last profile")]
    LastProfile,
    #[error("contact info not found")]
    ContactNotFound,
    #[error("cannot remove primary email")]
    CannotRemovePrimaryEmail,
}

/// A refresh token bound to one device slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub expires_at: i64,
}

/// Short-lived numeric second-factor code; exists only during a 2FA login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationCode {
    pub code: String,
    pub attempts: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(rename = "type")]
    pub account_type: String,
    pub account_id: String,
    #[serde(default)]
    pub password_hash: String,
    /// 0 = never confirmed, >0 = confirmed at, <0 = awaiting re-confirmation
    /// after an account-id change.
    #[serde(default)]
    pub account_confirmed_at: i64,
    #[serde(default)]
    pub preferred_language: String,
    #[serde(default)]
    pub failed_login_attempts: Vec<i64>,
    #[serde(default)]
    pub password_reset_triggers: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<VerificationCode>,
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshToken>,
}

/// A sub-identity under one account, used to submit answers on behalf of
/// different household members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactInfo {
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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactPreferences {
    #[serde(default)]
    pub subscribed_to_newsletter: bool,
    #[serde(default)]
    pub send_newsletter_to: Vec<Uuid>,
    #[serde(default)]
    pub receive_weekly_message_day_of_week: i32,
    #[serde(default)]
    pub subscribed_to_weekly: bool,
}

impl Default for ContactPreferences {
    fn default() -> Self {
        Self {
            subscribed_to_newsletter: false,
            send_newsletter_to: Vec::new(),
            receive_weekly_message_day_of_week: 0,
            subscribed_to_weekly: true,
        }
    }
}

/// All timestamps are unix seconds; 0 means never/unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timestamps {
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub last_login: i64,
    #[serde(default)]
    pub last_token_refresh: i64,
    #[serde(default)]
    pub last_password_change: i64,
    #[serde(default)]
    pub reminder_to_confirm_sent_at: i64,
    /// Unix second at which the retention sweeper will physically remove the
    /// account; 0 when not scheduled.
    #[serde(default)]
    pub marked_for_deletion: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub account: Account,
    #[serde(default)]
    pub roles: Vec<String>,
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub contact_infos: Vec<ContactInfo>,
    #[serde(default)]
    pub contact_preferences: ContactPreferences,
    #[serde(default)]
    pub timestamps: Timestamps,
}

impl User {
    /// Build a fresh email participant: one main profile aliased from the
    /// email local-part and the address as an unconfirmed contact.
    #[must_use]
    pub fn new_email_user(
        email: &str,
        password_hash: &str,
        preferred_language: &str,
        wants_newsletter: bool,
        weekly_message_day_of_week: i32,
        now: i64,
    ) -> Self {
        let alias = email.split('@').next().unwrap_or(email).to_string();
        let mut user = Self {
            id: Uuid::nil(),
            account: Account {
                account_type: ACCOUNT_TYPE_EMAIL.to_string(),
                account_id: email.to_string(),
                password_hash: password_hash.to_string(),
                account_confirmed_at: 0,
                preferred_language: preferred_language.to_string(),
                failed_login_attempts: Vec::new(),
                password_reset_triggers: Vec::new(),
                verification_code: None,
                refresh_tokens: Vec::new(),
            },
            roles: vec![ROLE_PARTICIPANT.to_string()],
            profiles: Vec::new(),
            contact_infos: Vec::new(),
            contact_preferences: ContactPreferences {
                subscribed_to_newsletter: wants_newsletter,
                send_newsletter_to: Vec::new(),
                receive_weekly_message_day_of_week: weekly_message_day_of_week,
                subscribed_to_weekly: true,
            },
            timestamps: Timestamps {
                created_at: now,
                ..Timestamps::default()
            },
        };
        user.add_profile(Profile {
            id: Uuid::new_v4(),
            alias,
            avatar_id: None,
            consent_confirmed_at: 0,
            main_profile: true,
            created_at: now,
        });
        user.add_new_email(email, false, now);
        user
    }

    /// Append a refresh token, keeping only the newest slots.
    pub fn add_refresh_token(&mut self, token: &str, expires_at: i64) {
        self.account.refresh_tokens.push(RefreshToken {
            token: token.to_string(),
            expires_at,
        });
        let len = self.account.refresh_tokens.len();
        if len > REFRESH_TOKEN_SLOTS {
            self.account.refresh_tokens.drain(0..len - REFRESH_TOKEN_SLOTS);
        }
    }

    /// Remove a refresh token; absence or expiry signals replay.
    ///
    /// # Errors
    /// `LogicError::WrongRefreshToken` when the token is not present or no
    /// longer valid. An expired slot is dropped either way.
    pub fn remove_refresh_token(&mut self, token: &str, now: i64) -> Result<(), LogicError> {
        let mut valid = false;
        let mut found = false;
        self.account.refresh_tokens.retain(|entry| {
            if entry.token == token {
                found = true;
                valid = entry.expires_at > now;
                return false;
            }
            true
        });
        if found && valid {
            Ok(())
        } else {
            Err(LogicError::WrongRefreshToken)
        }
    }

    /// True iff a non-expired verification code exists that has never been
    /// tried and is at most `seconds` old.
    #[must_use]
    pub fn has_unused_verification_code_newer_than(&self, seconds: i64, now: i64) -> bool {
        self.account.verification_code.as_ref().is_some_and(|code| {
            code.attempts == 0 && code.expires_at > now && code.created_at >= now - seconds
        })
    }

    pub fn add_profile(&mut self, mut profile: Profile) {
        if self.profiles.is_empty() {
            profile.main_profile = true;
        } else if profile.main_profile {
            for existing in &mut self.profiles {
                existing.main_profile = false;
            }
        }
        self.profiles.push(profile);
    }

    /// Replace a profile by id, preserving the single-main invariant.
    ///
    /// # Errors
    /// `LogicError::ProfileNotFound` when no profile carries the id.
    pub fn update_profile(&mut self, mut profile: Profile) -> Result<(), LogicError> {
        let index = self
            .profiles
            .iter()
            .position(|existing| existing.id == profile.id)
            .ok_or(LogicError::ProfileNotFound)?;
        let promote = profile.main_profile;
        profile.created_at = self.profiles[index].created_at;
        self.profiles[index] = profile;
        if promote {
            for (i, existing) in self.profiles.iter_mut().enumerate() {
                if i != index {
                    existing.main_profile = false;
                }
            }
        } else if !self.profiles.iter().any(|existing| existing.main_profile) {
            // The main profile cannot be demoted without promoting another.
            self.profiles[index].main_profile = true;
        }
        Ok(())
    }

    /// Remove a profile by id; removing the main profile promotes the next.
    ///
    /// # Errors
    /// `LogicError::LastProfile` when only one profile remains,
    /// `LogicError::ProfileNotFound` when the id does not resolve.
    pub fn remove_profile(&mut self, id: Uuid) -> Result<(), LogicError> {
        if self.profiles.len() <= 1 {
            return Err(LogicError::LastProfile);
        }
        let index = self
            .profiles
            .iter()
            .position(|existing| existing.id == id)
            .ok_or(LogicError::ProfileNotFound)?;
        let removed = self.profiles.remove(index);
        if removed.main_profile {
            if let Some(next) = self.profiles.first_mut() {
                next.main_profile = true;
            }
        }
        Ok(())
    }

    /// The main profile id plus all other profile ids, for token claims.
    #[must_use]
    pub fn main_and_other_profile_ids(&self) -> (String, Vec<String>) {
        let mut main = String::new();
        let mut others = Vec::new();
        for profile in &self.profiles {
            if profile.main_profile {
                main = profile.id.to_string();
            } else {
                others.push(profile.id.to_string());
            }
        }
        (main, others)
    }

    /// Append an email contact; duplicate addresses return the existing id.
    pub fn add_new_email(&mut self, email: &str, confirmed: bool, now: i64) -> Uuid {
        if let Some(existing) = self.find_contact_info_by_type_and_addr(CONTACT_TYPE_EMAIL, email) {
            return existing.id;
        }
        let id = Uuid::new_v4();
        self.contact_infos.push(ContactInfo {
            id,
            contact_type: CONTACT_TYPE_EMAIL.to_string(),
            email: email.to_string(),
            phone: String::new(),
            confirmed_at: if confirmed { now } else { 0 },
        });
        id
    }

    /// Remove a contact; the entry matching the account id is protected.
    ///
    /// # Errors
    /// `LogicError::CannotRemovePrimaryEmail` for the login contact,
    /// `LogicError::ContactNotFound` when the id does not resolve.
    pub fn remove_contact_info(&mut self, id: Uuid) -> Result<(), LogicError> {
        let index = self
            .contact_infos
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(LogicError::ContactNotFound)?;
        let entry = &self.contact_infos[index];
        if entry.contact_type == CONTACT_TYPE_EMAIL && entry.email == self.account.account_id {
            return Err(LogicError::CannotRemovePrimaryEmail);
        }
        self.contact_infos.remove(index);
        Ok(())
    }

    #[must_use]
    pub fn find_contact_info_by_type_and_addr(
        &self,
        contact_type: &str,
        address: &str,
    ) -> Option<&ContactInfo> {
        self.contact_infos.iter().find(|entry| {
            entry.contact_type == contact_type
                && if contact_type == CONTACT_TYPE_EMAIL {
                    entry.email == address
                } else {
                    entry.phone == address
                }
        })
    }

    /// Swap a contact id inside the newsletter recipient list.
    pub fn replace_contact_info_in_contact_preferences(&mut self, old: Uuid, new: Uuid) {
        for entry in &mut self.contact_preferences.send_newsletter_to {
            if *entry == old {
                *entry = new;
            }
        }
    }

    /// Confirm a contact; confirming the login contact also confirms the
    /// account.
    ///
    /// # Errors
    /// `LogicError::ContactNotFound` when the id does not resolve.
    pub fn confirm_contact_info(&mut self, id: Uuid, now: i64) -> Result<(), LogicError> {
        let entry = self
            .contact_infos
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(LogicError::ContactNotFound)?;
        entry.confirmed_at = now;
        if entry.contact_type == CONTACT_TYPE_EMAIL && entry.email == self.account.account_id {
            self.account.account_confirmed_at = now;
        }
        Ok(())
    }

    /// Rate limit on password-reset emails: fewer than 5 in the last hour.
    #[must_use]
    pub fn can_trigger_password_reset(&self, now: i64) -> bool {
        let cutoff = now - PASSWORD_RESET_WINDOW;
        self.account
            .password_reset_triggers
            .iter()
            .filter(|ts| **ts > cutoff)
            .count()
            < PASSWORD_RESET_THRESHOLD
    }

    /// Failed-login lockout: 5 or more failures within the last 5 minutes.
    #[must_use]
    pub fn is_login_blocked(&self, now: i64) -> bool {
        let cutoff = now - LOGIN_BLOCK_WINDOW;
        self.account
            .failed_login_attempts
            .iter()
            .filter(|ts| **ts > cutoff)
            .count()
            >= LOGIN_BLOCK_THRESHOLD
    }

    /// Drop lockout bookkeeping older than the relevant windows; called
    /// before a whole-document save on successful login.
    pub fn trim_attempt_logs(&mut self, now: i64) {
        let login_cutoff = now - LOGIN_BLOCK_WINDOW;
        self.account
            .failed_login_attempts
            .retain(|ts| *ts > login_cutoff);
        let reset_cutoff = now - PASSWORD_RESET_WINDOW;
        self.account
            .password_reset_triggers
            .retain(|ts| *ts > reset_cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::super::REFRESH_TOKEN_SLOTS;
    use super::{LogicError, Profile, User, VerificationCode};
    use uuid::Uuid;

    const NOW: i64 = 1_700_000_000;

    fn test_user() -> User {
        User::new_email_user("alice@example.org", "$argon2id$hash", "en", true, 3, NOW)
    }

    fn named_profile(alias: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            alias: alias.to_string(),
            avatar_id: None,
            consent_confirmed_at: 0,
            main_profile: false,
            created_at: NOW,
        }
    }

    #[test]
    fn new_email_user_shape() {
        let user = test_user();
        assert_eq!(user.account.account_id, "alice@example.org");
        assert_eq!(user.account.account_confirmed_at, 0);
        assert_eq!(user.profiles.len(), 1);
        assert_eq!(user.profiles[0].alias, "alice");
        assert!(user.profiles[0].main_profile);
        assert_eq!(user.contact_infos.len(), 1);
        assert_eq!(user.contact_infos[0].email, "alice@example.org");
        assert_eq!(user.contact_infos[0].confirmed_at, 0);
        assert!(user.contact_preferences.subscribed_to_newsletter);
        assert!(user.contact_preferences.subscribed_to_weekly);
    }

    #[test]
    fn refresh_tokens_keep_newest_slots() {
        let mut user = test_user();
        for i in 0..15 {
            user.add_refresh_token(&format!("token-{i}"), NOW + 1000);
        }
        assert_eq!(user.account.refresh_tokens.len(), REFRESH_TOKEN_SLOTS);
        assert_eq!(user.account.refresh_tokens[0].token, "token-5");
        assert_eq!(user.account.refresh_tokens[9].token, "token-14");
    }

    #[test]
    fn remove_refresh_token_detects_replay() {
        let mut user = test_user();
        user.add_refresh_token("token-a", NOW + 1000);
        assert!(user.remove_refresh_token("token-a", NOW).is_ok());
        assert_eq!(
            user.remove_refresh_token("token-a", NOW),
            Err(LogicError::WrongRefreshToken)
        );
    }

    #[test]
    fn expired_refresh_token_is_not_accepted() {
        let mut user = test_user();
        user.add_refresh_token("token-a", NOW - 1);
        assert_eq!(
            user.remove_refresh_token("token-a", NOW),
            Err(LogicError::WrongRefreshToken)
        );
        // The stale slot is dropped on the failed lookup.
        assert!(user.account.refresh_tokens.is_empty());
    }

    #[test]
    fn exactly_one_main_profile_after_add() {
        let mut user = test_user();
        let mut second = named_profile("bob");
        second.main_profile = true;
        user.add_profile(second);
        assert_eq!(
            user.profiles.iter().filter(|p| p.main_profile).count(),
            1
        );
        assert!(user.profiles[1].main_profile);
    }

    #[test]
    fn removing_main_profile_promotes_next() {
        let mut user = test_user();
        user.add_profile(named_profile("bob"));
        let main_id = user.profiles[0].id;
        user.remove_profile(main_id).expect("remove");
        assert_eq!(user.profiles.len(), 1);
        assert!(user.profiles[0].main_profile);
        assert_eq!(user.profiles[0].alias, "bob");
    }

    #[test]
    fn last_profile_cannot_be_removed() {
        let mut user = test_user();
        let id = user.profiles[0].id;
        assert_eq!(user.remove_profile(id), Err(LogicError::LastProfile));
    }

    #[test]
    fn update_profile_keeps_main_invariant() {
        let mut user = test_user();
        user.add_profile(named_profile("bob"));
        let mut updated = user.profiles[0].clone();
        updated.main_profile = false;
        user.update_profile(updated).expect("update");
        // Demoting the main without promoting another is ignored.
        assert!(user.profiles[0].main_profile);

        let mut promoted = user.profiles[1].clone();
        promoted.main_profile = true;
        user.update_profile(promoted).expect("update");
        assert!(!user.profiles[0].main_profile);
        assert!(user.profiles[1].main_profile);
    }

    #[test]
    fn update_unknown_profile_fails() {
        let mut user = test_user();
        assert_eq!(
            user.update_profile(named_profile("ghost")),
            Err(LogicError::ProfileNotFound)
        );
    }

    #[test]
    fn add_new_email_dedupes() {
        let mut user = test_user();
        let first = user.add_new_email("second@example.org", false, NOW);
        let second = user.add_new_email("second@example.org", false, NOW);
        assert_eq!(first, second);
        assert_eq!(user.contact_infos.len(), 2);
    }

    #[test]
    fn primary_email_cannot_be_removed() {
        let mut user = test_user();
        let primary = user.contact_infos[0].id;
        assert_eq!(
            user.remove_contact_info(primary),
            Err(LogicError::CannotRemovePrimaryEmail)
        );
        let secondary = user.add_new_email("second@example.org", false, NOW);
        assert!(user.remove_contact_info(secondary).is_ok());
    }

    #[test]
    fn confirming_login_contact_confirms_account() {
        let mut user = test_user();
        let primary = user.contact_infos[0].id;
        user.confirm_contact_info(primary, NOW).expect("confirm");
        assert_eq!(user.contact_infos[0].confirmed_at, NOW);
        assert_eq!(user.account.account_confirmed_at, NOW);

        let secondary = user.add_new_email("second@example.org", false, NOW);
        user.confirm_contact_info(secondary, NOW + 5).expect("confirm");
        // Confirming a secondary contact leaves the account timestamp alone.
        assert_eq!(user.account.account_confirmed_at, NOW);
    }

    #[test]
    fn replace_contact_in_preferences() {
        let mut user = test_user();
        let old = user.contact_infos[0].id;
        let new = Uuid::new_v4();
        user.contact_preferences.send_newsletter_to = vec![old];
        user.replace_contact_info_in_contact_preferences(old, new);
        assert_eq!(user.contact_preferences.send_newsletter_to, vec![new]);
    }

    #[test]
    fn password_reset_trigger_rate() {
        let mut user = test_user();
        assert!(user.can_trigger_password_reset(NOW));
        user.account.password_reset_triggers = vec![NOW - 10, NOW - 20, NOW - 30, NOW - 40];
        assert!(user.can_trigger_password_reset(NOW));
        user.account.password_reset_triggers.push(NOW - 50);
        assert!(!user.can_trigger_password_reset(NOW));
        // Old triggers fall out of the window.
        user.account.password_reset_triggers = vec![NOW - 3601; 5];
        assert!(user.can_trigger_password_reset(NOW));
    }

    #[test]
    fn login_block_window() {
        let mut user = test_user();
        assert!(!user.is_login_blocked(NOW));
        user.account.failed_login_attempts = vec![NOW - 10, NOW - 20, NOW - 30, NOW - 40];
        assert!(!user.is_login_blocked(NOW));
        user.account.failed_login_attempts.push(NOW - 50);
        assert!(user.is_login_blocked(NOW));
        user.account.failed_login_attempts = vec![NOW - 301; 5];
        assert!(!user.is_login_blocked(NOW));
    }

    #[test]
    fn unused_verification_code_check() {
        let mut user = test_user();
        assert!(!user.has_unused_verification_code_newer_than(600, NOW));
        user.account.verification_code = Some(VerificationCode {
            code: "123456".to_string(),
            attempts: 0,
            created_at: NOW - 30,
            expires_at: NOW + 570,
        });
        assert!(user.has_unused_verification_code_newer_than(600, NOW));

        if let Some(code) = user.account.verification_code.as_mut() {
            code.attempts = 1;
        }
        assert!(!user.has_unused_verification_code_newer_than(600, NOW));

        user.account.verification_code = Some(VerificationCode {
            code: "123456".to_string(),
            attempts: 0,
            created_at: NOW - 700,
            expires_at: NOW + 100,
        });
        assert!(!user.has_unused_verification_code_newer_than(600, NOW));
    }

    #[test]
    fn trim_attempt_logs_drops_stale_entries() {
        let mut user = test_user();
        user.account.failed_login_attempts = vec![NOW - 400, NOW - 100];
        user.account.password_reset_triggers = vec![NOW - 4000, NOW - 100];
        user.trim_attempt_logs(NOW);
        assert_eq!(user.account.failed_login_attempts, vec![NOW - 100]);
        assert_eq!(user.account.password_reset_triggers, vec![NOW - 100]);
    }
}
