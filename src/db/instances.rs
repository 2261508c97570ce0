//! Registered study instances and machine-to-machine app tokens.
//!
//! Only instance ids present here are accepted by the RPC endpoints; the
//! retention sweeper iterates the same registry.

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;

use super::{StoreError, query_span};
use crate::unix_now;

/// A logical study tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: String,
    pub name: String,
    pub created_at: i64,
}

/// Machine-to-machine token granting access to a set of instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppToken {
    pub token: String,
    pub instance_ids: Vec<String>,
}

#[derive(Clone)]
pub struct InstanceStore {
    pool: PgPool,
}

impl InstanceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    /// `StoreError::AlreadyExists` when the instance id is taken.
    pub async fn add_instance(&self, instance_id: &str, name: &str) -> Result<Instance, StoreError> {
        let query = "INSERT INTO instances (instance_id, name, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (instance_id) DO NOTHING \
             RETURNING instance_id, name, created_at";
        let row = sqlx::query(query)
            .bind(instance_id)
            .bind(name)
            .bind(unix_now())
            .fetch_optional(&self.pool)
            .instrument(query_span("INSERT", query))
            .await?;
        row.map_or(Err(StoreError::AlreadyExists), |row| instance_from_row(&row))
    }

    /// # Errors
    /// `StoreError::NotFound` when the instance does not exist.
    pub async fn update_instance(
        &self,
        instance_id: &str,
        name: &str,
    ) -> Result<Instance, StoreError> {
        let query = "UPDATE instances SET name = $2 WHERE instance_id = $1 \
             RETURNING instance_id, name, created_at";
        let row = sqlx::query(query)
            .bind(instance_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| instance_from_row(&row))
    }

    /// # Errors
    /// `StoreError::NotFound` when the instance does not exist.
    pub async fn delete_instance(&self, instance_id: &str) -> Result<(), StoreError> {
        let query = "DELETE FROM instances WHERE instance_id = $1";
        let result = sqlx::query(query)
            .bind(instance_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        if result.rows_affected() < 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    /// `StoreError::NotFound` when the instance does not exist.
    pub async fn get_instance(&self, instance_id: &str) -> Result<Instance, StoreError> {
        let query = "SELECT instance_id, name, created_at FROM instances WHERE instance_id = $1";
        let row = sqlx::query(query)
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        row.map_or(Err(StoreError::NotFound), |row| instance_from_row(&row))
    }

    /// # Errors
    /// Surfaces database failures.
    pub async fn get_all_instances(&self) -> Result<Vec<Instance>, StoreError> {
        let query = "SELECT instance_id, name, created_at FROM instances ORDER BY instance_id";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        rows.iter().map(instance_from_row).collect()
    }

    /// # Errors
    /// `StoreError::NotFound` when the token is unknown.
    pub async fn find_app_token(&self, token: &str) -> Result<AppToken, StoreError> {
        let query = "SELECT token, instance_ids FROM app_tokens WHERE token = $1";
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        let Some(row) = row else {
            return Err(StoreError::NotFound);
        };
        Ok(AppToken {
            token: row.try_get("token")?,
            instance_ids: row.try_get("instance_ids")?,
        })
    }
}

fn instance_from_row(row: &PgRow) -> Result<Instance, StoreError> {
    Ok(Instance {
        instance_id: row.try_get("instance_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}
