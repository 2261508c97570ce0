//! Retention sweeper: scheduled background routines over every registered
//! instance.
//!
//! Four passes run per cycle: delete never-confirmed accounts past the
//! threshold, remind the younger ones once, mark inactive non-staff accounts
//! for deletion, and physically delete accounts whose grace clock elapsed.
//! Per-user failures are logged and skipped; the shutdown signal stops a
//! sweep at the next row boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::api::handlers::Deps;
use crate::collab::logging::{LOG_EVENT_ACCOUNT_DELETED, LogEventType};
use crate::collab::messaging::{
    EMAIL_TYPE_ACCOUNT_DELETED_AFTER_INACTIVITY, EMAIL_TYPE_REMINDER_TO_CONFIRM, SendEmailReq,
};
use crate::db::StoreError;
use crate::unix_now;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Pause between sweep cycles.
    pub period: Duration,
    /// Never-confirmed accounts older than this are deleted (seconds).
    pub clean_up_unverified_after: i64,
    /// Never-confirmed accounts older than this get one reminder (seconds).
    pub reminder_to_unverified_after: i64,
    /// Inactivity threshold before an account is marked (seconds).
    pub mark_inactive_after: i64,
    /// Grace interval between marking and physical deletion (seconds).
    pub delete_marked_after: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(12 * 60 * 60),
            clean_up_unverified_after: 30 * 24 * 60 * 60,
            reminder_to_unverified_after: 7 * 24 * 60 * 60,
            mark_inactive_after: 2 * 365 * 24 * 60 * 60,
            delete_marked_after: 30 * 24 * 60 * 60,
        }
    }
}

/// Spawn the sweeper loop; it runs one cycle immediately, then on the
/// configured period until shutdown.
pub fn spawn_retention_worker(
    deps: Arc<Deps>,
    config: SweeperConfig,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut shutdown_changed = shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }
            run_sweep(&deps, &config, &shutdown).await;

            tokio::select! {
                () = sleep(config.period) => {}
                _ = shutdown_changed.changed() => {
                    info!("retention sweeper stopped");
                    break;
                }
            }
        }
    })
}

async fn run_sweep(deps: &Deps, config: &SweeperConfig, shutdown: &watch::Receiver<bool>) {
    let instances = match deps.instances.get_all_instances().await {
        Ok(instances) => instances,
        Err(err) => {
            error!("retention sweep could not list instances: {err}");
            return;
        }
    };

    for instance in instances {
        if *shutdown.borrow() {
            return;
        }
        let instance_id = instance.instance_id.as_str();

        if let Err(err) = clean_up_unverified_users(deps, config, instance_id).await {
            error!("[{instance_id}] unverified cleanup failed: {err}");
        }
        if let Err(err) = send_reminder_to_confirm(deps, config, shutdown, instance_id).await {
            error!("[{instance_id}] confirmation reminders failed: {err}");
        }
        if let Err(err) = mark_inactive_for_deletion(deps, config, shutdown, instance_id).await {
            error!("[{instance_id}] inactivity marking failed: {err}");
        }
        if let Err(err) = delete_marked_users(deps, shutdown, instance_id).await {
            error!("[{instance_id}] marked-user deletion failed: {err}");
        }
    }
}

async fn clean_up_unverified_users(
    deps: &Deps,
    config: &SweeperConfig,
    instance_id: &str,
) -> Result<u64, StoreError> {
    let created_before = unix_now() - config.clean_up_unverified_after;
    let count = deps
        .users
        .delete_unverified_users(instance_id, created_before)
        .await?;
    if count > 0 {
        info!("[{instance_id}] deleted {count} unverified accounts");
    }
    Ok(count)
}

async fn send_reminder_to_confirm(
    deps: &Deps,
    config: &SweeperConfig,
    shutdown: &watch::Receiver<bool>,
    instance_id: &str,
) -> Result<u64, StoreError> {
    let created_before = unix_now() - config.reminder_to_unverified_after;
    let messaging = deps.messaging.clone();
    let reminded = deps
        .users
        .for_each_unconfirmed_to_remind(shutdown, instance_id, created_before, |user| {
            let messaging = messaging.clone();
            let instance_id = instance_id.to_string();
            async move {
                if let Some(client) = messaging {
                    client
                        .send_instant_email(&SendEmailReq {
                            instance_id,
                            to: vec![user.account.account_id.clone()],
                            message_type: EMAIL_TYPE_REMINDER_TO_CONFIRM.to_string(),
                            content_infos: HashMap::new(),
                            preferred_language: user.account.preferred_language.clone(),
                            use_low_prio: true,
                        })
                        .await?;
                }
                Ok(())
            }
        })
        .await?;
    if reminded > 0 {
        info!("[{instance_id}] sent {reminded} confirmation reminders");
    }
    Ok(reminded)
}

async fn mark_inactive_for_deletion(
    deps: &Deps,
    config: &SweeperConfig,
    shutdown: &watch::Receiver<bool>,
    instance_id: &str,
) -> Result<u64, StoreError> {
    let users = deps
        .users
        .find_inactive_users(instance_id, config.mark_inactive_after)
        .await?;

    let mut marked = 0u64;
    for user in users {
        if *shutdown.borrow() {
            return Err(StoreError::Cancelled);
        }
        // reset=false: an already-scheduled deletion is never extended.
        match deps
            .users
            .update_marked_for_deletion(
                instance_id,
                user.id,
                config.delete_marked_after,
                false,
            )
            .await
        {
            Ok(true) => marked += 1,
            Ok(false) => {}
            Err(err) => error!("[{instance_id}] failed to mark {}: {err}", user.id),
        }
    }
    if marked > 0 {
        info!("[{instance_id}] marked {marked} inactive accounts for deletion");
    }
    Ok(marked)
}

async fn delete_marked_users(
    deps: &Deps,
    shutdown: &watch::Receiver<bool>,
    instance_id: &str,
) -> Result<u64, StoreError> {
    let users = deps.users.find_marked_for_deletion(instance_id).await?;

    let mut deleted = 0u64;
    for user in users {
        if *shutdown.borrow() {
            return Err(StoreError::Cancelled);
        }

        // The goodbye email goes out before the address is gone.
        deps.send_email_detached(SendEmailReq {
            instance_id: instance_id.to_string(),
            to: vec![user.account.account_id.clone()],
            message_type: EMAIL_TYPE_ACCOUNT_DELETED_AFTER_INACTIVITY.to_string(),
            content_infos: HashMap::new(),
            preferred_language: user.account.preferred_language.clone(),
            use_low_prio: true,
        });

        if let Err(err) = deps.users.delete_user(instance_id, user.id).await {
            error!("[{instance_id}] failed to delete {}: {err}", user.id);
            continue;
        }
        if let Err(err) = deps
            .temp_tokens
            .delete_all_for_user(instance_id, user.id, None)
            .await
        {
            error!("[{instance_id}] failed to purge temp tokens for {}: {err}", user.id);
        }
        deps.save_log_event_detached(
            instance_id,
            &user.id.to_string(),
            LogEventType::Log,
            LOG_EVENT_ACCOUNT_DELETED,
            &user.account.account_id,
        );
        deleted += 1;
    }
    if deleted > 0 {
        info!("[{instance_id}] deleted {deleted} accounts past their grace clock");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::SweeperConfig;
    use std::time::Duration;

    #[test]
    fn default_intervals_are_sane() {
        let config = SweeperConfig::default();
        assert_eq!(config.period, Duration::from_secs(43_200));
        assert_eq!(config.clean_up_unverified_after, 2_592_000);
        assert!(config.reminder_to_unverified_after < config.clean_up_unverified_after);
        assert!(config.delete_marked_after > 0);
    }
}
