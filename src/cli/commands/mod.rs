pub mod db;
pub mod logging;
pub mod service;

use clap::{
    ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("cohortid")
        .about("User identity and account management for federated study instances")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles);

    let command = service::with_args(command);
    let command = db::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::{db, logging, service};

    fn required_args() -> Vec<&'static str> {
        vec![
            "cohortid",
            "--jwt-token-key",
            "/tmp/cohortid-key.pem",
            "--user-db-connection-str",
            "localhost:5432",
            "--user-db-username",
            "svc",
            "--user-db-password",
            "secret",
            "--global-db-connection-str",
            "localhost:5432",
            "--global-db-username",
            "svc",
            "--global-db-password",
            "secret",
        ]
    }

    #[test]
    fn test_new() {
        let command = new();
        assert_eq!(command.get_name(), "cohortid");
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        let command = new();
        let matches = command.get_matches_from(required_args());

        assert_eq!(
            matches.get_one::<u16>(service::ARG_PORT).copied(),
            Some(5200)
        );
        assert_eq!(matches.get_one::<u64>(db::ARG_DB_TIMEOUT).copied(), Some(30));
        assert_eq!(
            matches.get_one::<u32>(db::ARG_DB_MAX_POOL_SIZE).copied(),
            Some(8)
        );
        assert_eq!(
            matches
                .get_one::<i64>(service::ARG_TOKEN_EXPIRATION_MIN)
                .copied(),
            Some(60)
        );
        assert_eq!(
            matches
                .get_one::<bool>(db::ARG_USE_NO_CURSOR_TIMEOUT)
                .copied(),
            Some(false)
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("USER_MANAGEMENT_LISTEN_PORT", Some("5202")),
                ("JWT_TOKEN_KEY", Some("/tmp/cohortid-key.pem")),
                ("USER_DB_CONNECTION_STR", Some("users-db:5432")),
                ("USER_DB_USERNAME", Some("svc")),
                ("USER_DB_PASSWORD", Some("secret")),
                ("GLOBAL_DB_CONNECTION_STR", Some("global-db:5432")),
                ("GLOBAL_DB_USERNAME", Some("svc")),
                ("GLOBAL_DB_PASSWORD", Some("secret")),
                ("NEW_USER_RATE_LIMIT", Some("25")),
                ("VERIFICATION_CODE_LIFETIME", Some("600")),
                ("USE_NO_CURSOR_TIMEOUT", Some("true")),
                ("LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["cohortid"]);
                assert_eq!(
                    matches.get_one::<u16>(service::ARG_PORT).copied(),
                    Some(5202)
                );
                assert_eq!(
                    matches
                        .get_one::<i64>(service::ARG_NEW_USER_RATE_LIMIT)
                        .copied(),
                    Some(25)
                );
                assert_eq!(
                    matches
                        .get_one::<i64>(service::ARG_VERIFICATION_CODE_LIFETIME)
                        .copied(),
                    Some(600)
                );
                assert_eq!(
                    matches
                        .get_one::<bool>(db::ARG_USE_NO_CURSOR_TIMEOUT)
                        .copied(),
                    Some(true)
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("LOG_LEVEL", Some(level)),
                    ("JWT_TOKEN_KEY", Some("/tmp/cohortid-key.pem")),
                    ("USER_DB_CONNECTION_STR", Some("users-db:5432")),
                    ("USER_DB_USERNAME", Some("svc")),
                    ("USER_DB_PASSWORD", Some("secret")),
                    ("GLOBAL_DB_CONNECTION_STR", Some("global-db:5432")),
                    ("GLOBAL_DB_USERNAME", Some("svc")),
                    ("GLOBAL_DB_PASSWORD", Some("secret")),
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["cohortid"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn missing_required_args_fail() {
        temp_env::with_vars(
            [
                ("JWT_TOKEN_KEY", None::<&str>),
                ("USER_DB_CONNECTION_STR", None::<&str>),
                ("USER_DB_USERNAME", None::<&str>),
                ("USER_DB_PASSWORD", None::<&str>),
                ("GLOBAL_DB_CONNECTION_STR", None::<&str>),
                ("GLOBAL_DB_USERNAME", None::<&str>),
                ("GLOBAL_DB_PASSWORD", None::<&str>),
            ],
            || {
                let command = new();
                let result = command.try_get_matches_from(vec!["cohortid"]);
                assert!(result.is_err());
            },
        );
    }
}
