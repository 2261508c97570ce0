//! Small helpers shared by the auth and account handlers.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use regex::Regex;
use uuid::Uuid;

use super::ApiError;

/// Token subjects and request user ids must be well-formed uuids.
pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidArgument("invalid user id"))
}

/// Normalize an email for lookup and uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Extract the bearer token from the Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{bearer_token, normalize_email, valid_email};
    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.ORG "), "alice@example.org");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("alice@example.org"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.org"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn user_ids_must_be_uuids() {
        assert!(super::parse_user_id("not-a-uuid").is_err());
        assert!(super::parse_user_id("6ba7b810-9dad-11d1-80b4-00c04fd430c8").is_ok());
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc123"));
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
