//! Account-management endpoints; every operation acts on the caller's own
//! account, resolved from the bearer token.

pub mod email;
pub mod password;
pub mod preferences;
pub mod profiles;
pub mod types;
pub mod user;

use axum::http::HeaderMap;
use uuid::Uuid;

use super::utils::{bearer_token, parse_user_id};
use super::{ApiError, Deps};
use crate::crypto::jwt::Claims;

/// Resolve the caller from the Authorization header.
pub(crate) fn require_caller(deps: &Deps, headers: &HeaderMap) -> Result<(Claims, Uuid), ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::MissingArgument)?;
    let claims = deps.validate_access_token(&token)?;
    let user_id = parse_user_id(&claims.sub)?;
    Ok((claims, user_id))
}

#[cfg(test)]
mod tests {
    use super::require_caller;
    use crate::api::handlers::test_support::test_deps;
    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    #[tokio::test]
    async fn caller_requires_authorization_header() {
        let deps = test_deps();
        assert!(require_caller(&deps, &HeaderMap::new()).is_err());
    }

    #[tokio::test]
    async fn caller_rejects_garbage_tokens() {
        let deps = test_deps();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"));
        assert!(require_caller(&deps, &headers).is_err());
    }
}
