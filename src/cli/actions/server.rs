use anyhow::{Context, Result};
use secrecy::SecretString;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::api;
use crate::api::handlers::{Deps, ServiceConfig};
use crate::collab::logging::LoggingClient;
use crate::collab::messaging::MessagingClient;
use crate::crypto::jwt::TokenSigner;
use crate::db;
use crate::db::instances::InstanceStore;
use crate::db::temp_tokens::TempTokenStore;
use crate::db::users::UserStore;
use crate::sweeper::{SweeperConfig, spawn_retention_worker};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub messaging_addr: Option<String>,
    pub logging_addr: Option<String>,
    /// Path to the RSA private key PEM used by the claims codec.
    pub jwt_token_key: String,
    pub new_user_rate_limit: i64,
    pub clean_up_unverified_after: i64,
    pub reminder_to_unverified_after: i64,
    pub token_expiration_min: i64,
    pub verification_code_lifetime: i64,
    pub invitation_token_lifetime: i64,
    pub contact_verification_token_lifetime: i64,
    pub mark_inactive_after: i64,
    pub delete_marked_after: i64,
    pub retention_sweep_period: u64,
    pub user_db_connection_str: String,
    pub user_db_username: String,
    pub user_db_password: SecretString,
    pub user_db_connection_prefix: String,
    pub global_db_connection_str: String,
    pub global_db_username: String,
    pub global_db_password: SecretString,
    pub global_db_connection_prefix: String,
    pub db_timeout: u64,
    pub db_idle_conn_timeout: u64,
    pub db_max_pool_size: u32,
    pub db_name_prefix: String,
    pub use_no_cursor_timeout: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key cannot be loaded, the databases are
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let key_bytes = fs::read(&args.jwt_token_key)
        .with_context(|| format!("failed to read signing key: {}", args.jwt_token_key))?;
    let signer = TokenSigner::from_private_key_bytes(&key_bytes)
        .context("failed to parse signing key")?;

    let user_db_config = db::DbConfig {
        connection_str: args.user_db_connection_str,
        username: args.user_db_username,
        password: args.user_db_password,
        connection_options: args.user_db_connection_prefix,
        timeout_secs: args.db_timeout,
        idle_conn_timeout_secs: args.db_idle_conn_timeout,
        max_pool_size: args.db_max_pool_size,
        db_name_prefix: args.db_name_prefix.clone(),
        no_cursor_timeout: args.use_no_cursor_timeout,
    };
    let global_db_config = db::DbConfig {
        connection_str: args.global_db_connection_str,
        username: args.global_db_username,
        password: args.global_db_password,
        connection_options: args.global_db_connection_prefix,
        timeout_secs: args.db_timeout,
        idle_conn_timeout_secs: args.db_idle_conn_timeout,
        max_pool_size: args.db_max_pool_size,
        db_name_prefix: args.db_name_prefix,
        no_cursor_timeout: args.use_no_cursor_timeout,
    };

    let user_pool = db::connect_user_db(&user_db_config).await?;
    let global_pool = db::connect_global_db(&global_db_config).await?;
    db::ensure_schema(&user_pool, &global_pool).await?;

    let messaging = args
        .messaging_addr
        .as_deref()
        .map(MessagingClient::new)
        .transpose()?;
    let logging = args
        .logging_addr
        .as_deref()
        .map(LoggingClient::new)
        .transpose()?;
    if messaging.is_none() {
        info!("messaging service address not set, outbound email disabled");
    }
    if logging.is_none() {
        info!("logging service address not set, audit events disabled");
    }

    let deps = Arc::new(Deps::new(
        UserStore::new(user_pool, args.use_no_cursor_timeout),
        TempTokenStore::new(global_pool.clone()),
        InstanceStore::new(global_pool),
        signer,
        messaging,
        logging,
        ServiceConfig {
            token_expiry_min: args.token_expiration_min,
            verification_code_lifetime: args.verification_code_lifetime,
            invitation_token_lifetime: args.invitation_token_lifetime,
            contact_verification_token_lifetime: args.contact_verification_token_lifetime,
            new_user_count_limit: args.new_user_rate_limit,
        },
    ));

    // One shutdown signal feeds both axum and the retention sweeper.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {err}");
            return;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let sweeper_config = SweeperConfig {
        period: Duration::from_secs(args.retention_sweep_period),
        clean_up_unverified_after: args.clean_up_unverified_after,
        reminder_to_unverified_after: args.reminder_to_unverified_after,
        mark_inactive_after: args.mark_inactive_after,
        delete_marked_after: args.delete_marked_after,
    };
    spawn_retention_worker(deps.clone(), sweeper_config, shutdown_rx.clone());

    api::serve(args.port, deps, shutdown_rx).await
}
