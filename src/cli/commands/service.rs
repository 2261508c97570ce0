//! Service-level arguments: listen port, collaborator addresses, token
//! lifetimes, rate caps and retention thresholds.

use clap::{Arg, Command};

pub const ARG_PORT: &str = "port";
pub const ARG_MESSAGING_ADDR: &str = "messaging-addr";
pub const ARG_LOGGING_ADDR: &str = "logging-addr";
pub const ARG_JWT_TOKEN_KEY: &str = "jwt-token-key";
pub const ARG_NEW_USER_RATE_LIMIT: &str = "new-user-rate-limit";
pub const ARG_CLEAN_UP_UNVERIFIED_AFTER: &str = "clean-up-unverified-users-after";
pub const ARG_REMINDER_TO_UNVERIFIED_AFTER: &str = "send-reminder-to-unverified-users-after";
pub const ARG_TOKEN_EXPIRATION_MIN: &str = "token-expiration-min";
pub const ARG_VERIFICATION_CODE_LIFETIME: &str = "verification-code-lifetime";
pub const ARG_TOKEN_INVITATION_LIFETIME: &str = "token-invitation-lifetime";
pub const ARG_TOKEN_CONTACT_VERIFICATION_LIFETIME: &str = "token-contact-verification-lifetime";
pub const ARG_MARK_INACTIVE_AFTER: &str = "mark-inactive-users-after";
pub const ARG_DELETE_MARKED_AFTER: &str = "delete-marked-users-after";
pub const ARG_RETENTION_SWEEP_PERIOD: &str = "retention-sweep-period";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .env("USER_MANAGEMENT_LISTEN_PORT")
                .default_value("5200")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_MESSAGING_ADDR)
                .long(ARG_MESSAGING_ADDR)
                .help("Base URL of the messaging service; email is disabled when unset")
                .env("ADDR_MESSAGING_SERVICE"),
        )
        .arg(
            Arg::new(ARG_LOGGING_ADDR)
                .long(ARG_LOGGING_ADDR)
                .help("Base URL of the logging service; audit events are disabled when unset")
                .env("ADDR_LOGGING_SERVICE"),
        )
        .arg(
            Arg::new(ARG_JWT_TOKEN_KEY)
                .long(ARG_JWT_TOKEN_KEY)
                .help("Path to the RSA private key (PEM) used to sign access tokens")
                .env("JWT_TOKEN_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_NEW_USER_RATE_LIMIT)
                .long(ARG_NEW_USER_RATE_LIMIT)
                .help("Signups per hour and instance before invitations are required")
                .env("NEW_USER_RATE_LIMIT")
                .default_value("100")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CLEAN_UP_UNVERIFIED_AFTER)
                .long(ARG_CLEAN_UP_UNVERIFIED_AFTER)
                .help("Seconds before never-confirmed accounts are deleted")
                .env("CLEAN_UP_UNVERIFIED_USERS_AFTER")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REMINDER_TO_UNVERIFIED_AFTER)
                .long(ARG_REMINDER_TO_UNVERIFIED_AFTER)
                .help("Seconds before never-confirmed accounts get one reminder")
                .env("SEND_REMINDER_TO_UNVERIFIED_USERS_AFTER")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_EXPIRATION_MIN)
                .long(ARG_TOKEN_EXPIRATION_MIN)
                .help("Access-token lifetime in minutes")
                .env("TOKEN_EXPIRATION_MIN")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_CODE_LIFETIME)
                .long(ARG_VERIFICATION_CODE_LIFETIME)
                .help("2FA verification-code lifetime in seconds")
                .env("VERIFICATION_CODE_LIFETIME")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_INVITATION_LIFETIME)
                .long(ARG_TOKEN_INVITATION_LIFETIME)
                .help("Invitation token lifetime in minutes")
                .env("TOKEN_INVITATION_LIFETIME")
                .default_value("10080")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_CONTACT_VERIFICATION_LIFETIME)
                .long(ARG_TOKEN_CONTACT_VERIFICATION_LIFETIME)
                .help("Contact-verification token lifetime in minutes")
                .env("TOKEN_CONTACT_VERIFICATION_LIFETIME")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_MARK_INACTIVE_AFTER)
                .long(ARG_MARK_INACTIVE_AFTER)
                .help("Seconds of inactivity before accounts are marked for deletion")
                .env("MARK_INACTIVE_USERS_AFTER")
                .default_value("63072000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_DELETE_MARKED_AFTER)
                .long(ARG_DELETE_MARKED_AFTER)
                .help("Grace seconds between marking and physical deletion")
                .env("DELETE_MARKED_USERS_AFTER")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RETENTION_SWEEP_PERIOD)
                .long(ARG_RETENTION_SWEEP_PERIOD)
                .help("Seconds between retention sweep cycles")
                .env("RETENTION_SWEEP_PERIOD")
                .default_value("43200")
                .value_parser(clap::value_parser!(u64)),
        )
}
