//! # Cohortid (User Identity & Account Management)
//!
//! `cohortid` is the authoritative identity service for an epidemiology
//! platform that federates study "instances" on shared infrastructure. It
//! owns participant and staff accounts, the credentials used to authenticate
//! them, the short-lived access / opaque refresh token pair issued on their
//! behalf, and the single-purpose temp tokens behind every out-of-band flow
//! (email confirmation, password reset, account-id restore, unsubscribe,
//! invitations).
//!
//! ## Tenant model
//!
//! A study instance is the tenant boundary: accounts, temp tokens and email
//! templates are partitioned by instance id, and only registered ids are
//! accepted by the endpoints.
//!
//! ## Retention
//!
//! A background sweeper deletes never-confirmed accounts past a threshold,
//! reminds the younger ones once, marks long-inactive participant accounts
//! for deletion, and removes them when the grace clock elapses. A login
//! always unschedules a pending deletion.

pub mod api;
pub mod cli;
pub mod collab;
pub mod crypto;
pub mod db;
pub mod sweeper;
pub mod users;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Current unix time in seconds; the single clock source for the crate.
#[must_use]
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::{APP_USER_AGENT, unix_now};

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn unix_now_is_past_2024() {
        assert!(unix_now() > 1_704_067_200);
    }
}
