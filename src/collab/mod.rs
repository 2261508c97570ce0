//! Clients for the external collaborator services.
//!
//! Outbound email goes through the messaging service, audit events through
//! the logging service. Both are best effort: the handlers fire them from
//! detached tasks and never surface their failures to the caller.

pub mod logging;
pub mod messaging;

use anyhow::{Context, Result};
use std::time::Duration;

const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(COLLABORATOR_TIMEOUT)
        .build()
        .context("failed to build collaborator http client")
}
