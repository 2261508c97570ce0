//! Per-instance persistence of the user aggregate.
//!
//! Additive fields (`failed_login_attempts`, `password_reset_triggers`,
//! `refresh_tokens` appends done during login) go through field-level atomic
//! updates; `update_user` is the only whole-document replace and is reserved
//! for callers holding the full authoritative state.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, pool::PoolConnection};
use std::future::Future;
use tokio::sync::watch;
use tracing::{Instrument, error};
use uuid::Uuid;

use super::{StoreError, query_span};
use crate::unix_now;
use crate::users::{
    Account, ContactPreferences, ROLE_ADMIN, ROLE_RESEARCHER, ROLE_SERVICE_ACCOUNT, User,
};

const SWEEP_BATCH_SIZE: i64 = 32;

const USER_COLUMNS: &str = "id, account_type, account_id, password_hash, account_confirmed_at, \
     preferred_language, failed_login_attempts, password_reset_triggers, verification_code, \
     refresh_tokens, roles, profiles, contact_infos, contact_preferences, created_at, \
     updated_at, last_login, last_token_refresh, last_password_change, \
     reminder_to_confirm_sent_at, marked_for_deletion";

/// Filter options for streaming sweeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserFilter {
    pub only_confirmed: bool,
    pub reminder_week_day: Option<i32>,
}

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
    no_cursor_timeout: bool,
}

impl UserStore {
    #[must_use]
    pub fn new(pool: PgPool, no_cursor_timeout: bool) -> Self {
        Self {
            pool,
            no_cursor_timeout,
        }
    }

    /// Insert a user unless the account id is already taken; never overwrites.
    ///
    /// # Errors
    /// `StoreError::AlreadyExists` when the `(instance, account_id)` pair is
    /// taken.
    pub async fn add_user(&self, instance_id: &str, user: &User) -> Result<Uuid, StoreError> {
        let query = "\
            INSERT INTO users (instance_id, account_type, account_id, password_hash, \
                account_confirmed_at, preferred_language, failed_login_attempts, \
                password_reset_triggers, verification_code, refresh_tokens, roles, profiles, \
                contact_infos, contact_preferences, created_at, updated_at, last_login, \
                last_token_refresh, last_password_change, reminder_to_confirm_sent_at, \
                marked_for_deletion) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                $17, $18, $19, $20, $21) \
            ON CONFLICT (instance_id, account_id) DO NOTHING \
            RETURNING id";
        let row = bind_user_fields(sqlx::query(query).bind(instance_id), user)?
            .fetch_optional(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;

        match row {
            Some(row) => Ok(row.try_get("id")?),
            None => Err(StoreError::AlreadyExists),
        }
    }

    /// # Errors
    /// `StoreError::NotFound` when the id does not resolve.
    pub async fn get_user_by_id(&self, instance_id: &str, id: Uuid) -> Result<User, StoreError> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE instance_id = $1 AND id = $2");
        let row = sqlx::query(&query)
            .bind(instance_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| user_from_row(&row))
    }

    /// # Errors
    /// `StoreError::NotFound` when no account carries the id.
    pub async fn get_user_by_account_id(
        &self,
        instance_id: &str,
        account_id: &str,
    ) -> Result<User, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE instance_id = $1 AND account_id = $2"
        );
        let row = sqlx::query(&query)
            .bind(instance_id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| user_from_row(&row))
    }

    /// Whole-document replace; bumps `updated_at` and returns the new state.
    ///
    /// # Errors
    /// `StoreError::NotFound` when the user no longer exists.
    pub async fn update_user(&self, instance_id: &str, user: &User) -> Result<User, StoreError> {
        let mut user = user.clone();
        user.timestamps.updated_at = unix_now();

        let query = format!(
            "UPDATE users SET account_type = $3, account_id = $4, password_hash = $5, \
                account_confirmed_at = $6, preferred_language = $7, failed_login_attempts = $8, \
                password_reset_triggers = $9, verification_code = $10, refresh_tokens = $11, \
                roles = $12, profiles = $13, contact_infos = $14, contact_preferences = $15, \
                created_at = $16, updated_at = $17, last_login = $18, last_token_refresh = $19, \
                last_password_change = $20, reminder_to_confirm_sent_at = $21, \
                marked_for_deletion = $22 \
            WHERE instance_id = $1 AND id = $2 \
            RETURNING {USER_COLUMNS}"
        );
        let row = bind_user_fields(
            sqlx::query(&query).bind(instance_id).bind(user.id),
            &user,
        )?
        .fetch_optional(&self.pool)
        .instrument(query_span("UPDATE", &query))
        .await?;
        row.map_or(Err(StoreError::NotFound), |row| user_from_row(&row))
    }

    /// Field-level password update; also stamps `last_password_change`.
    ///
    /// # Errors
    /// `StoreError::NotFound` when the user no longer exists.
    pub async fn update_password(
        &self,
        instance_id: &str,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let query = "UPDATE users SET password_hash = $3, last_password_change = $4 \
             WHERE instance_id = $1 AND id = $2";
        let result = sqlx::query(query)
            .bind(instance_id)
            .bind(id)
            .bind(password_hash)
            .bind(unix_now())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        if result.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Atomic append so concurrent whole-document saves cannot drop it.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn append_failed_login(&self, instance_id: &str, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE users \
             SET failed_login_attempts = array_append(failed_login_attempts, $3) \
             WHERE instance_id = $1 AND id = $2";
        sqlx::query(query)
            .bind(instance_id)
            .bind(id)
            .bind(unix_now())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(())
    }

    /// # Errors
    /// Surfaces database failures.
    pub async fn append_password_reset_trigger(
        &self,
        instance_id: &str,
        id: Uuid,
    ) -> Result<(), StoreError> {
        let query = "UPDATE users \
             SET password_reset_triggers = array_append(password_reset_triggers, $3) \
             WHERE instance_id = $1 AND id = $2";
        sqlx::query(query)
            .bind(instance_id)
            .bind(id)
            .bind(unix_now())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(())
    }

    /// # Errors
    /// `StoreError::NotFound` when the user no longer exists.
    pub async fn update_preferred_language(
        &self,
        instance_id: &str,
        id: Uuid,
        language: &str,
    ) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users SET preferred_language = $3, updated_at = $4 \
             WHERE instance_id = $1 AND id = $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(instance_id)
            .bind(id)
            .bind(language)
            .bind(unix_now())
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| user_from_row(&row))
    }

    /// # Errors
    /// `StoreError::NotFound` when the user no longer exists.
    pub async fn update_contact_preferences(
        &self,
        instance_id: &str,
        id: Uuid,
        preferences: &ContactPreferences,
    ) -> Result<User, StoreError> {
        let query = format!(
            "UPDATE users SET contact_preferences = $3, updated_at = $4 \
             WHERE instance_id = $1 AND id = $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(instance_id)
            .bind(id)
            .bind(serde_json::to_value(preferences)?)
            .bind(unix_now())
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| user_from_row(&row))
    }

    /// Stamp a successful login; also unschedules a pending deletion.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn update_login_time(&self, instance_id: &str, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE users SET last_login = $3, marked_for_deletion = 0 \
             WHERE instance_id = $1 AND id = $2";
        sqlx::query(query)
            .bind(instance_id)
            .bind(id)
            .bind(unix_now())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(())
    }

    /// # Errors
    /// Surfaces database failures.
    pub async fn update_reminder_sent(&self, instance_id: &str, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE users SET reminder_to_confirm_sent_at = $3 \
             WHERE instance_id = $1 AND id = $2";
        sqlx::query(query)
            .bind(instance_id)
            .bind(id)
            .bind(unix_now())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        Ok(())
    }

    /// Schedule or unschedule deletion.
    ///
    /// With `reset`, the mark is cleared unconditionally. Otherwise the mark
    /// is set to `now + delta` only when no mark is pending, so an already
    /// scheduled deletion is never extended. Returns whether a row matched.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn update_marked_for_deletion(
        &self,
        instance_id: &str,
        id: Uuid,
        delta: i64,
        reset: bool,
    ) -> Result<bool, StoreError> {
        let result = if reset {
            let query = "UPDATE users SET marked_for_deletion = 0 \
                 WHERE instance_id = $1 AND id = $2";
            sqlx::query(query)
                .bind(instance_id)
                .bind(id)
                .execute(&self.pool)
                .instrument(query_span("UPDATE", query))
                .await?
        } else {
            let query = "UPDATE users SET marked_for_deletion = $3 \
                 WHERE instance_id = $1 AND id = $2 AND NOT (marked_for_deletion > 0)";
            sqlx::query(query)
                .bind(instance_id)
                .bind(id)
                .bind(unix_now() + delta)
                .execute(&self.pool)
                .instrument(query_span("UPDATE", query))
                .await?
        };
        Ok(result.rows_affected() > 0)
    }

    /// Count signups within the last `interval` seconds (signup rate cap).
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn count_recently_created(
        &self,
        instance_id: &str,
        interval: i64,
    ) -> Result<i64, StoreError> {
        let query = "SELECT COUNT(*) FROM users WHERE instance_id = $1 AND created_at > $2";
        let count: i64 = sqlx::query_scalar(query)
            .bind(instance_id)
            .bind(unix_now() - interval)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(count)
    }

    /// # Errors
    /// `StoreError::NotFound` when no row was deleted.
    pub async fn delete_user(&self, instance_id: &str, id: Uuid) -> Result<(), StoreError> {
        let query = "DELETE FROM users WHERE instance_id = $1 AND id = $2";
        let result = sqlx::query(query)
            .bind(instance_id)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        if result.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete every never-confirmed account created before the threshold.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn delete_unverified_users(
        &self,
        instance_id: &str,
        created_before: i64,
    ) -> Result<u64, StoreError> {
        let query = "DELETE FROM users \
             WHERE instance_id = $1 AND account_confirmed_at = 0 AND created_at < $2";
        let result = sqlx::query(query)
            .bind(instance_id)
            .bind(created_before)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }

    /// Non-staff accounts idle beyond `inactive_after` seconds and not yet
    /// scheduled for deletion.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn find_inactive_users(
        &self,
        instance_id: &str,
        inactive_after: i64,
    ) -> Result<Vec<User>, StoreError> {
        let cutoff = unix_now() - inactive_after;
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE instance_id = $1 AND NOT (roles && $2) \
               AND last_login < $3 AND last_token_refresh < $3 \
               AND NOT (marked_for_deletion > 0)"
        );
        let rows = sqlx::query(&query)
            .bind(instance_id)
            .bind(staff_roles())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    /// Accounts whose grace clock has elapsed.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn find_marked_for_deletion(
        &self,
        instance_id: &str,
    ) -> Result<Vec<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE instance_id = $1 AND marked_for_deletion > 0 AND marked_for_deletion < $2"
        );
        let rows = sqlx::query(&query)
            .bind(instance_id)
            .bind(unix_now())
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    /// Accounts carrying a staff role.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn find_non_participants(&self, instance_id: &str) -> Result<Vec<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE instance_id = $1 AND roles && $2"
        );
        let rows = sqlx::query(&query)
            .bind(instance_id)
            .bind(staff_roles())
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    /// Streaming sweep in batches of 32 with keyset pagination.
    ///
    /// The shutdown signal is honoured between rows; a callback error aborts
    /// the sweep. Returns the number of users visited.
    ///
    /// # Errors
    /// `StoreError::Cancelled` on shutdown, `StoreError::Callback` when the
    /// callback fails, otherwise database failures.
    pub async fn for_each_user<F, Fut>(
        &self,
        shutdown: &watch::Receiver<bool>,
        instance_id: &str,
        filter: UserFilter,
        mut callback: F,
    ) -> Result<u64, StoreError>
    where
        F: FnMut(User) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE instance_id = $1 \
               AND ($2::bool = FALSE OR account_confirmed_at > 0) \
               AND ($3::int IS NULL OR \
                    (contact_preferences->>'receive_weekly_message_day_of_week')::int = $3) \
               AND ($4::uuid IS NULL OR id > $4) \
             ORDER BY id LIMIT $5"
        );

        let mut conn = self.acquire_sweep_conn().await?;
        let mut last_id: Option<Uuid> = None;
        let mut visited = 0u64;
        let result = loop {
            let rows = sqlx::query(&query)
                .bind(instance_id)
                .bind(filter.only_confirmed)
                .bind(filter.reminder_week_day)
                .bind(last_id)
                .bind(SWEEP_BATCH_SIZE)
                .fetch_all(&mut *conn)
                .instrument(query_span("SELECT", &query))
                .await;
            let rows = match rows {
                Ok(rows) => rows,
                Err(err) => break Err(StoreError::from(err)),
            };
            if rows.is_empty() {
                break Ok(visited);
            }

            let mut aborted = None;
            for row in &rows {
                if *shutdown.borrow() {
                    aborted = Some(StoreError::Cancelled);
                    break;
                }
                let user = match user_from_row(row) {
                    Ok(user) => user,
                    Err(err) => {
                        // A single corrupt document must not end the sweep.
                        error!("skipping corrupt user document: {err}");
                        continue;
                    }
                };
                last_id = Some(user.id);
                if let Err(err) = callback(user).await {
                    aborted = Some(StoreError::Callback(err));
                    break;
                }
                visited += 1;
            }
            if let Some(err) = aborted {
                break Err(err);
            }
            if let Some(row) = rows.last() {
                match row.try_get("id") {
                    Ok(id) => last_id = Some(id),
                    Err(err) => break Err(StoreError::from(err)),
                }
            }
        };
        self.release_sweep_conn(conn).await;
        result
    }

    /// Streaming sweep over never-confirmed accounts that have not been
    /// reminded yet and were created before the threshold.
    ///
    /// Per-user callback errors are logged and skipped; after a successful
    /// callback the reminder timestamp is stamped so the account is not
    /// visited again. Returns the number of reminders sent.
    ///
    /// # Errors
    /// `StoreError::Cancelled` on shutdown, otherwise database failures.
    pub async fn for_each_unconfirmed_to_remind<F, Fut>(
        &self,
        shutdown: &watch::Receiver<bool>,
        instance_id: &str,
        created_before: i64,
        mut callback: F,
    ) -> Result<u64, StoreError>
    where
        F: FnMut(User) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE instance_id = $1 AND account_confirmed_at < 1 \
               AND reminder_to_confirm_sent_at < 1 AND created_at < $2 \
               AND ($3::uuid IS NULL OR id > $3) \
             ORDER BY id LIMIT $4"
        );

        let mut conn = self.acquire_sweep_conn().await?;
        let mut last_id: Option<Uuid> = None;
        let mut reminded = 0u64;
        let result = loop {
            let rows = sqlx::query(&query)
                .bind(instance_id)
                .bind(created_before)
                .bind(last_id)
                .bind(SWEEP_BATCH_SIZE)
                .fetch_all(&mut *conn)
                .instrument(query_span("SELECT", &query))
                .await;
            let rows = match rows {
                Ok(rows) => rows,
                Err(err) => break Err(StoreError::from(err)),
            };
            if rows.is_empty() {
                break Ok(reminded);
            }

            let mut cancelled = false;
            for row in &rows {
                if *shutdown.borrow() {
                    cancelled = true;
                    break;
                }
                let user = match user_from_row(row) {
                    Ok(user) => user,
                    Err(err) => {
                        error!("skipping corrupt user document: {err}");
                        continue;
                    }
                };
                let user_id = user.id;
                if let Err(err) = callback(user).await {
                    error!("reminder callback failed for {user_id}: {err}");
                    continue;
                }
                if let Err(err) = self.update_reminder_sent(instance_id, user_id).await {
                    error!("failed to stamp reminder for {user_id}: {err}");
                    continue;
                }
                reminded += 1;
            }
            if cancelled {
                break Err(StoreError::Cancelled);
            }
            if let Some(row) = rows.last() {
                match row.try_get("id") {
                    Ok(id) => last_id = Some(id),
                    Err(err) => break Err(StoreError::from(err)),
                }
            }
        };
        self.release_sweep_conn(conn).await;
        result
    }

    /// Liveness check for the health endpoint.
    ///
    /// # Errors
    /// Surfaces database failures.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(())
    }

    async fn acquire_sweep_conn(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if self.no_cursor_timeout {
            // Sweeps may legitimately outlive the per-call statement timeout.
            sqlx::query("SET statement_timeout = 0")
                .execute(&mut *conn)
                .await?;
        }
        Ok(conn)
    }

    async fn release_sweep_conn(&self, mut conn: PoolConnection<Postgres>) {
        if self.no_cursor_timeout {
            // RESET restores the value the pool configured at connect time.
            if let Err(err) = sqlx::query("RESET statement_timeout")
                .execute(&mut *conn)
                .await
            {
                error!("failed to restore statement_timeout: {err}");
            }
        }
    }
}

fn staff_roles() -> Vec<String> {
    vec![
        ROLE_SERVICE_ACCOUNT.to_string(),
        ROLE_RESEARCHER.to_string(),
        ROLE_ADMIN.to_string(),
    ]
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

/// Bind the shared field tail used by INSERT and whole-document UPDATE.
fn bind_user_fields<'q>(query: PgQuery<'q>, user: &User) -> Result<PgQuery<'q>, StoreError> {
    let verification_code = user
        .account
        .verification_code
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    Ok(query
        .bind(user.account.account_type.clone())
        .bind(user.account.account_id.clone())
        .bind(user.account.password_hash.clone())
        .bind(user.account.account_confirmed_at)
        .bind(user.account.preferred_language.clone())
        .bind(user.account.failed_login_attempts.clone())
        .bind(user.account.password_reset_triggers.clone())
        .bind(verification_code)
        .bind(serde_json::to_value(&user.account.refresh_tokens)?)
        .bind(user.roles.clone())
        .bind(serde_json::to_value(&user.profiles)?)
        .bind(serde_json::to_value(&user.contact_infos)?)
        .bind(serde_json::to_value(&user.contact_preferences)?)
        .bind(user.timestamps.created_at)
        .bind(user.timestamps.updated_at)
        .bind(user.timestamps.last_login)
        .bind(user.timestamps.last_token_refresh)
        .bind(user.timestamps.last_password_change)
        .bind(user.timestamps.reminder_to_confirm_sent_at)
        .bind(user.timestamps.marked_for_deletion))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let verification_code: Option<serde_json::Value> = row.try_get("verification_code")?;
    Ok(User {
        id: row.try_get("id")?,
        account: Account {
            account_type: row.try_get("account_type")?,
            account_id: row.try_get("account_id")?,
            password_hash: row.try_get("password_hash")?,
            account_confirmed_at: row.try_get("account_confirmed_at")?,
            preferred_language: row.try_get("preferred_language")?,
            failed_login_attempts: row.try_get("failed_login_attempts")?,
            password_reset_triggers: row.try_get("password_reset_triggers")?,
            verification_code: verification_code
                .map(serde_json::from_value)
                .transpose()?,
            refresh_tokens: serde_json::from_value(row.try_get("refresh_tokens")?)?,
        },
        roles: row.try_get("roles")?,
        profiles: serde_json::from_value(row.try_get("profiles")?)?,
        contact_infos: serde_json::from_value(row.try_get("contact_infos")?)?,
        contact_preferences: serde_json::from_value(row.try_get("contact_preferences")?)?,
        timestamps: crate::users::Timestamps {
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_login: row.try_get("last_login")?,
            last_token_refresh: row.try_get("last_token_refresh")?,
            last_password_change: row.try_get("last_password_change")?,
            reminder_to_confirm_sent_at: row.try_get("reminder_to_confirm_sent_at")?,
            marked_for_deletion: row.try_get("marked_for_deletion")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{UserFilter, staff_roles};
    use crate::users::{Profile, User};
    use uuid::Uuid;

    #[test]
    fn staff_roles_cover_non_participants() {
        assert_eq!(
            staff_roles(),
            vec![
                "SERVICE_ACCOUNT".to_string(),
                "RESEARCHER".to_string(),
                "ADMIN".to_string()
            ]
        );
    }

    #[test]
    fn user_filter_defaults_to_unfiltered() {
        let filter = UserFilter::default();
        assert!(!filter.only_confirmed);
        assert_eq!(filter.reminder_week_day, None);
    }

    #[test]
    fn jsonb_columns_round_trip_through_serde() {
        let mut user =
            User::new_email_user("alice@example.org", "$argon2id$hash", "en", false, 2, 1_000);
        user.add_profile(Profile {
            id: Uuid::new_v4(),
            alias: "kid".to_string(),
            avatar_id: Some("a3".to_string()),
            consent_confirmed_at: 0,
            main_profile: false,
            created_at: 1_000,
        });
        user.add_refresh_token("token-a", 2_000);

        let profiles = serde_json::to_value(&user.profiles).expect("encode");
        let decoded: Vec<Profile> = serde_json::from_value(profiles).expect("decode");
        assert_eq!(decoded, user.profiles);

        let tokens = serde_json::to_value(&user.account.refresh_tokens).expect("encode");
        let decoded: Vec<crate::users::RefreshToken> =
            serde_json::from_value(tokens).expect("decode");
        assert_eq!(decoded, user.account.refresh_tokens);
    }
}
