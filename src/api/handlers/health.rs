//! Health endpoint.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::Deps;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Health {
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database is reachable", body = Health),
        (status = 503, description = "Database is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(deps: Extension<Arc<Deps>>) -> impl IntoResponse {
    let database = match deps.users.ping().await {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("Failed to ping database: {err}");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let status = if database.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database.is_ok() { "ok" } else { "unreachable" }.to_string(),
    };
    (status, Json(body))
}
