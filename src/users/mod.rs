//! The user aggregate and the pure rules that operate on it.
//!
//! Persistence is left to `crate::db::users`; everything here mutates an
//! in-memory aggregate and is exercised both by the RPC handlers and the
//! retention sweeper.

mod model;

pub use model::{
    Account, ContactInfo, ContactPreferences, LogicError, Profile, RefreshToken, Timestamps, User,
    VerificationCode,
};

pub const ROLE_PARTICIPANT: &str = "PARTICIPANT";
pub const ROLE_RESEARCHER: &str = "RESEARCHER";
pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_SERVICE_ACCOUNT: &str = "SERVICE_ACCOUNT";

pub const ACCOUNT_TYPE_EMAIL: &str = "email";
pub const CONTACT_TYPE_EMAIL: &str = "email";

/// Device slots per account; the oldest refresh token is evicted on overflow.
pub const REFRESH_TOKEN_SLOTS: usize = 10;

/// Refresh tokens expire when unused for this long.
pub const REFRESH_TOKEN_TTL: i64 = 90 * 24 * 60 * 60;

/// Profile count cap, enforced when a profile is added.
pub const MAX_PROFILES: usize = 6;
