//! Database connection arguments for the user and global databases.

use clap::{Arg, Command};

pub const ARG_USER_DB_CONNECTION_STR: &str = "user-db-connection-str";
pub const ARG_USER_DB_USERNAME: &str = "user-db-username";
pub const ARG_USER_DB_PASSWORD: &str = "user-db-password";
pub const ARG_USER_DB_CONNECTION_PREFIX: &str = "user-db-connection-prefix";
pub const ARG_GLOBAL_DB_CONNECTION_STR: &str = "global-db-connection-str";
pub const ARG_GLOBAL_DB_USERNAME: &str = "global-db-username";
pub const ARG_GLOBAL_DB_PASSWORD: &str = "global-db-password";
pub const ARG_GLOBAL_DB_CONNECTION_PREFIX: &str = "global-db-connection-prefix";
pub const ARG_DB_TIMEOUT: &str = "db-timeout";
pub const ARG_DB_IDLE_CONN_TIMEOUT: &str = "db-idle-conn-timeout";
pub const ARG_DB_MAX_POOL_SIZE: &str = "db-max-pool-size";
pub const ARG_DB_NAME_PREFIX: &str = "db-name-prefix";
pub const ARG_USE_NO_CURSOR_TIMEOUT: &str = "use-no-cursor-timeout";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USER_DB_CONNECTION_STR)
                .long(ARG_USER_DB_CONNECTION_STR)
                .help("host:port of the users database")
                .env("USER_DB_CONNECTION_STR")
                .required(true),
        )
        .arg(
            Arg::new(ARG_USER_DB_USERNAME)
                .long(ARG_USER_DB_USERNAME)
                .help("Username for the users database")
                .env("USER_DB_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new(ARG_USER_DB_PASSWORD)
                .long(ARG_USER_DB_PASSWORD)
                .help("Password for the users database")
                .env("USER_DB_PASSWORD")
                .required(true)
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_USER_DB_CONNECTION_PREFIX)
                .long(ARG_USER_DB_CONNECTION_PREFIX)
                .help("Extra DSN options for the users database (e.g. ?sslmode=disable)")
                .env("USER_DB_CONNECTION_PREFIX")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_GLOBAL_DB_CONNECTION_STR)
                .long(ARG_GLOBAL_DB_CONNECTION_STR)
                .help("host:port of the global database")
                .env("GLOBAL_DB_CONNECTION_STR")
                .required(true),
        )
        .arg(
            Arg::new(ARG_GLOBAL_DB_USERNAME)
                .long(ARG_GLOBAL_DB_USERNAME)
                .help("Username for the global database")
                .env("GLOBAL_DB_USERNAME")
                .required(true),
        )
        .arg(
            Arg::new(ARG_GLOBAL_DB_PASSWORD)
                .long(ARG_GLOBAL_DB_PASSWORD)
                .help("Password for the global database")
                .env("GLOBAL_DB_PASSWORD")
                .required(true)
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_GLOBAL_DB_CONNECTION_PREFIX)
                .long(ARG_GLOBAL_DB_CONNECTION_PREFIX)
                .help("Extra DSN options for the global database")
                .env("GLOBAL_DB_CONNECTION_PREFIX")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_DB_TIMEOUT)
                .long(ARG_DB_TIMEOUT)
                .help("Per-call database timeout in seconds")
                .env("DB_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_DB_IDLE_CONN_TIMEOUT)
                .long(ARG_DB_IDLE_CONN_TIMEOUT)
                .help("Idle connection timeout in seconds")
                .env("DB_IDLE_CONN_TIMEOUT")
                .default_value("45")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_DB_MAX_POOL_SIZE)
                .long(ARG_DB_MAX_POOL_SIZE)
                .help("Connection pool size per database")
                .env("DB_MAX_POOL_SIZE")
                .default_value("8")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_DB_NAME_PREFIX)
                .long(ARG_DB_NAME_PREFIX)
                .help("Prefix prepended to both database names")
                .env("DB_DB_NAME_PREFIX")
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_USE_NO_CURSOR_TIMEOUT)
                .long(ARG_USE_NO_CURSOR_TIMEOUT)
                .help("Lift the statement timeout on explicit sweep paths")
                .env("USE_NO_CURSOR_TIMEOUT")
                .default_value("false")
                .value_parser(clap::value_parser!(bool)),
        )
}
