use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{db, service};
use anyhow::{Context, Result};
use secrecy::SecretString;

fn required_string(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn optional_string(matches: &clap::ArgMatches, name: &str) -> Option<String> {
    matches
        .get_one::<String>(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

struct DbArgs {
    connection_str: String,
    username: String,
    password: SecretString,
    connection_prefix: String,
}

fn parse_db_args(matches: &clap::ArgMatches, prefix: &str) -> Result<DbArgs> {
    let connection_str = required_string(matches, &format!("{prefix}-db-connection-str"))?;
    let username = required_string(matches, &format!("{prefix}-db-username"))?;
    let password = required_string(matches, &format!("{prefix}-db-password"))?;
    let connection_prefix = matches
        .get_one::<String>(&format!("{prefix}-db-connection-prefix"))
        .cloned()
        .unwrap_or_default();
    Ok(DbArgs {
        connection_str,
        username,
        password: SecretString::from(password),
        connection_prefix,
    })
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(service::ARG_PORT)
        .copied()
        .unwrap_or(5200);
    let jwt_token_key = required_string(matches, service::ARG_JWT_TOKEN_KEY)?;

    let user_db = parse_db_args(matches, "user")?;
    let global_db = parse_db_args(matches, "global")?;

    let int_arg = |name: &str, default: i64| {
        matches.get_one::<i64>(name).copied().unwrap_or(default)
    };

    Ok(Action::Server(Args {
        port,
        messaging_addr: optional_string(matches, service::ARG_MESSAGING_ADDR),
        logging_addr: optional_string(matches, service::ARG_LOGGING_ADDR),
        jwt_token_key,
        new_user_rate_limit: int_arg(service::ARG_NEW_USER_RATE_LIMIT, 100),
        clean_up_unverified_after: int_arg(service::ARG_CLEAN_UP_UNVERIFIED_AFTER, 2_592_000),
        reminder_to_unverified_after: int_arg(
            service::ARG_REMINDER_TO_UNVERIFIED_AFTER,
            604_800,
        ),
        token_expiration_min: int_arg(service::ARG_TOKEN_EXPIRATION_MIN, 60),
        verification_code_lifetime: int_arg(service::ARG_VERIFICATION_CODE_LIFETIME, 300),
        // Invitation and contact-verification lifetimes are configured in
        // minutes; everything downstream works in seconds.
        invitation_token_lifetime: int_arg(service::ARG_TOKEN_INVITATION_LIFETIME, 10_080) * 60,
        contact_verification_token_lifetime: int_arg(
            service::ARG_TOKEN_CONTACT_VERIFICATION_LIFETIME,
            43_200,
        ) * 60,
        mark_inactive_after: int_arg(service::ARG_MARK_INACTIVE_AFTER, 63_072_000),
        delete_marked_after: int_arg(service::ARG_DELETE_MARKED_AFTER, 2_592_000),
        retention_sweep_period: matches
            .get_one::<u64>(service::ARG_RETENTION_SWEEP_PERIOD)
            .copied()
            .unwrap_or(43_200),
        user_db_connection_str: user_db.connection_str,
        user_db_username: user_db.username,
        user_db_password: user_db.password,
        user_db_connection_prefix: user_db.connection_prefix,
        global_db_connection_str: global_db.connection_str,
        global_db_username: global_db.username,
        global_db_password: global_db.password,
        global_db_connection_prefix: global_db.connection_prefix,
        db_timeout: matches
            .get_one::<u64>(db::ARG_DB_TIMEOUT)
            .copied()
            .unwrap_or(30),
        db_idle_conn_timeout: matches
            .get_one::<u64>(db::ARG_DB_IDLE_CONN_TIMEOUT)
            .copied()
            .unwrap_or(45),
        db_max_pool_size: matches
            .get_one::<u32>(db::ARG_DB_MAX_POOL_SIZE)
            .copied()
            .unwrap_or(8),
        db_name_prefix: matches
            .get_one::<String>(db::ARG_DB_NAME_PREFIX)
            .cloned()
            .unwrap_or_default(),
        use_no_cursor_timeout: matches
            .get_one::<bool>(db::ARG_USE_NO_CURSOR_TIMEOUT)
            .copied()
            .unwrap_or(false),
    }))
}

#[cfg(test)]
mod tests {
    use super::handler;
    use crate::cli::actions::Action;

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                ("JWT_TOKEN_KEY", Some("/tmp/cohortid-key.pem")),
                ("USER_DB_CONNECTION_STR", Some("users-db:5432")),
                ("USER_DB_USERNAME", Some("svc")),
                ("USER_DB_PASSWORD", Some("secret")),
                ("GLOBAL_DB_CONNECTION_STR", Some("global-db:5432")),
                ("GLOBAL_DB_USERNAME", Some("svc")),
                ("GLOBAL_DB_PASSWORD", Some("secret")),
                ("TOKEN_INVITATION_LIFETIME", Some("60")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["cohortid"]);
                let action = handler(&matches).expect("action");
                let Action::Server(args) = action;
                assert_eq!(args.port, 5200);
                assert_eq!(args.jwt_token_key, "/tmp/cohortid-key.pem");
                // 60 minutes becomes seconds.
                assert_eq!(args.invitation_token_lifetime, 3600);
                assert_eq!(args.user_db_connection_str, "users-db:5432");
                assert!(args.messaging_addr.is_none());
            },
        );
    }
}
