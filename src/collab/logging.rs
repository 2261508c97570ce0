//! Logging-service client for the audit sink.

use anyhow::{Context, Result};
use serde::Serialize;

pub const LOG_EVENT_SIGNUP: &str = "signup-with-email";
pub const LOG_EVENT_LOGIN_SUCCESS: &str = "login-with-email";
pub const LOG_EVENT_WRONG_PASSWORD: &str = "wrong-password";
pub const LOG_EVENT_PASSWORD_CHANGED: &str = "password-changed";
pub const LOG_EVENT_PASSWORD_RESET: &str = "password-reset";
pub const LOG_EVENT_ACCOUNT_ID_CHANGED: &str = "account-id-changed";
pub const LOG_EVENT_ACCOUNT_DELETED: &str = "account-deleted";
pub const LOG_EVENT_TOKEN_REFRESH_SUCCESS: &str = "token-refresh-success";
pub const LOG_EVENT_TOKEN_REFRESH_FAILED: &str = "token-refresh-failed";
pub const LOG_EVENT_PROFILE_SAVED: &str = "profile-saved";
pub const LOG_EVENT_PROFILE_REMOVED: &str = "profile-removed";

/// Audit event classification; SECURITY events feed alerting.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum LogEventType {
    #[serde(rename = "LOG")]
    Log,
    #[serde(rename = "SECURITY")]
    Security,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveLogEventReq {
    pub instance_id: String,
    pub actor: String,
    pub event_type: LogEventType,
    pub event_name: String,
    pub detail: String,
}

#[derive(Clone)]
pub struct LoggingClient {
    base_url: String,
    http: reqwest::Client,
}

impl LoggingClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(addr: &str) -> Result<Self> {
        Ok(Self {
            base_url: addr.trim_end_matches('/').to_string(),
            http: super::http_client()?,
        })
    }

    /// # Errors
    /// Returns an error when the logging service is unreachable or rejects
    /// the event.
    pub async fn save_log_event(&self, request: &SaveLogEventReq) -> Result<()> {
        let url = format!("{}/v1/log-event", self.base_url);
        self.http
            .post(&url)
            .json(request)
            .send()
            .await
            .context("logging service unreachable")?
            .error_for_status()
            .context("logging service rejected event")?;
        Ok(())
    }
}
