//! Messaging-service client for outbound templated email.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;

pub const EMAIL_TYPE_REGISTRATION: &str = "registration";
pub const EMAIL_TYPE_VERIFY_EMAIL: &str = "verify-email";
pub const EMAIL_TYPE_VERIFICATION_CODE: &str = "verification-code";
pub const EMAIL_TYPE_PASSWORD_RESET: &str = "password-reset";
pub const EMAIL_TYPE_PASSWORD_CHANGED: &str = "password-changed";
pub const EMAIL_TYPE_ACCOUNT_ID_CHANGED: &str = "account-id-changed";
pub const EMAIL_TYPE_ACCOUNT_DELETED: &str = "account-deleted";
pub const EMAIL_TYPE_REMINDER_TO_CONFIRM: &str = "registration-reminder";
pub const EMAIL_TYPE_ACCOUNT_DELETED_AFTER_INACTIVITY: &str = "account-deleted-after-inactivity";

/// One instant email, addressed by template type; the messaging service owns
/// the actual content.
#[derive(Debug, Clone, Serialize)]
pub struct SendEmailReq {
    pub instance_id: String,
    pub to: Vec<String>,
    pub message_type: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub content_infos: HashMap<String, String>,
    pub preferred_language: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_low_prio: bool,
}

#[derive(Clone)]
pub struct MessagingClient {
    base_url: String,
    http: reqwest::Client,
}

impl MessagingClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(addr: &str) -> Result<Self> {
        Ok(Self {
            base_url: addr.trim_end_matches('/').to_string(),
            http: super::http_client()?,
        })
    }

    /// # Errors
    /// Returns an error when the messaging service is unreachable or rejects
    /// the request.
    pub async fn send_instant_email(&self, request: &SendEmailReq) -> Result<()> {
        let url = format!("{}/v1/email/send-instant", self.base_url);
        self.http
            .post(&url)
            .json(request)
            .send()
            .await
            .context("messaging service unreachable")?
            .error_for_status()
            .context("messaging service rejected email")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MessagingClient, SendEmailReq};
    use std::collections::HashMap;

    #[test]
    fn base_url_is_normalized() {
        let client = MessagingClient::new("http://messaging:5005/").expect("client");
        assert_eq!(client.base_url, "http://messaging:5005");
    }

    #[test]
    fn low_prio_flag_is_omitted_when_false() {
        let request = SendEmailReq {
            instance_id: "inst1".to_string(),
            to: vec!["alice@example.org".to_string()],
            message_type: super::EMAIL_TYPE_VERIFY_EMAIL.to_string(),
            content_infos: HashMap::new(),
            preferred_language: "en".to_string(),
            use_low_prio: false,
        };
        let json = serde_json::to_value(&request).expect("encode");
        assert!(json.get("use_low_prio").is_none());
        assert!(json.get("content_infos").is_none());
        assert_eq!(json["message_type"], "verify-email");
    }
}
