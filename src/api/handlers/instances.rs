//! Instance registry administration and app-token validation.

use axum::Json;
use axum::extract::Extension;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::types::ServiceStatus;
use super::utils::bearer_token;
use super::{ApiError, Deps};
use crate::db::StoreError;
use crate::db::instances::Instance;
use crate::users::ROLE_ADMIN;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstanceRequest {
    pub instance_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceData {
    pub instance_id: String,
    pub name: String,
    pub created_at: i64,
}

impl From<Instance> for InstanceData {
    fn from(instance: Instance) -> Self {
        Self {
            instance_id: instance.instance_id,
            name: instance.name,
            created_at: instance.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceList {
    pub instances: Vec<InstanceData>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AppTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AppTokenResponse {
    pub instance_ids: Vec<String>,
}

/// Instance administration is reserved for ADMIN tokens.
fn require_admin(deps: &Deps, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::MissingArgument)?;
    let claims = deps.validate_access_token(&token)?;
    if !claims.has_role(ROLE_ADMIN) {
        return Err(ApiError::NotAuthorized);
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/instances",
    responses(
        (status = 200, description = "Registered instances", body = InstanceList),
        (status = 403, description = "Admin role required", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "instances"
)]
pub async fn get_all_instances(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
) -> Result<Json<InstanceList>, ApiError> {
    require_admin(&deps, &headers)?;
    let instances = deps.instances.get_all_instances().await?;
    Ok(Json(InstanceList {
        instances: instances.into_iter().map(InstanceData::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/instances/add",
    request_body = InstanceRequest,
    responses(
        (status = 200, description = "Instance registered", body = InstanceData),
        (status = 400, description = "Instance already exists", body = String),
        (status = 403, description = "Admin role required", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "instances"
)]
pub async fn add_instance(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<InstanceRequest>>,
) -> Result<Json<InstanceData>, ApiError> {
    require_admin(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    match deps
        .instances
        .add_instance(&request.instance_id, &request.name)
        .await
    {
        Ok(instance) => Ok(Json(InstanceData::from(instance))),
        Err(StoreError::AlreadyExists) => {
            Err(ApiError::InvalidArgument("instance already exists"))
        }
        Err(err) => Err(err.into()),
    }
}

#[utoipa::path(
    post,
    path = "/v1/instances/update",
    request_body = InstanceRequest,
    responses(
        (status = 200, description = "Instance updated", body = InstanceData),
        (status = 403, description = "Admin role required", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "instances"
)]
pub async fn update_instance(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<InstanceRequest>>,
) -> Result<Json<InstanceData>, ApiError> {
    require_admin(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    let instance = deps
        .instances
        .update_instance(&request.instance_id, &request.name)
        .await?;
    Ok(Json(InstanceData::from(instance)))
}

#[utoipa::path(
    post,
    path = "/v1/instances/delete",
    request_body = InstanceRequest,
    responses(
        (status = 200, description = "Instance removed", body = ServiceStatus),
        (status = 403, description = "Admin role required", body = String)
    ),
    security(("bearer_token" = [])),
    tag = "instances"
)]
pub async fn delete_instance(
    deps: Extension<Arc<Deps>>,
    headers: HeaderMap,
    payload: Option<Json<InstanceRequest>>,
) -> Result<Json<ServiceStatus>, ApiError> {
    require_admin(&deps, &headers)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.instance_id.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    deps.instances.delete_instance(&request.instance_id).await?;
    Ok(Json(ServiceStatus::normal("instance deleted")))
}

#[utoipa::path(
    post,
    path = "/v1/app-token/validate",
    request_body = AppTokenRequest,
    responses(
        (status = 200, description = "Instances the token may act on", body = AppTokenResponse),
        (status = 400, description = "Unknown app token", body = String)
    ),
    tag = "instances"
)]
pub async fn validate_app_token(
    deps: Extension<Arc<Deps>>,
    payload: Option<Json<AppTokenRequest>>,
) -> Result<Json<AppTokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::MissingArgument);
    };
    if request.token.is_empty() {
        return Err(ApiError::MissingArgument);
    }

    match deps.instances.find_app_token(&request.token).await {
        Ok(app_token) => Ok(Json(AppTokenResponse {
            instance_ids: app_token.instance_ids,
        })),
        Err(StoreError::NotFound) => Err(ApiError::WrongToken),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::{add_instance, get_all_instances, validate_app_token};
    use crate::api::handlers::test_support::test_deps;
    use axum::extract::Extension;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn admin_endpoints_require_token() {
        let response = get_all_instances(Extension(test_deps()), HeaderMap::new())
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = add_instance(Extension(test_deps()), HeaderMap::new(), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn app_token_payload_is_required() {
        let response = validate_app_token(Extension(test_deps()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
