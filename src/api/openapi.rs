use super::handlers::{account, auth, health, instances, temptokens};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::{ComponentsBuilder, InfoBuilder, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. The bare `/` route is
/// intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the
    // route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::signup::signup_with_email))
        .routes(routes!(auth::login::login_with_email))
        .routes(routes!(auth::verification::resend_verification_code))
        .routes(routes!(auth::verification::verify_contact))
        .routes(routes!(auth::verification::auto_validate_temp_token))
        .routes(routes!(auth::password_reset::initiate_password_reset))
        .routes(routes!(auth::password_reset::get_infos_for_password_reset))
        .routes(routes!(auth::password_reset::reset_password))
        .routes(routes!(auth::tokens::validate_jwt))
        .routes(routes!(auth::tokens::renew_jwt))
        .routes(routes!(auth::tokens::revoke_all_refresh_tokens))
        .routes(routes!(account::user::get_user))
        .routes(routes!(account::user::delete_account))
        .routes(routes!(account::password::change_password))
        .routes(routes!(account::email::change_account_id_email))
        .routes(routes!(account::email::add_email))
        .routes(routes!(account::email::remove_email))
        .routes(routes!(account::email::resend_contact_verification))
        .routes(routes!(account::profiles::save_profile))
        .routes(routes!(account::profiles::remove_profile))
        .routes(routes!(account::preferences::change_preferred_language))
        .routes(routes!(account::preferences::update_contact_preferences))
        .routes(routes!(account::preferences::use_unsubscribe_token))
        .routes(routes!(temptokens::generate_temp_token))
        .routes(routes!(temptokens::get_or_create_temp_token))
        .routes(routes!(temptokens::get_temp_tokens))
        .routes(routes!(temptokens::delete_temp_token))
        .routes(routes!(temptokens::purge_user_temp_tokens))
        .routes(routes!(instances::get_all_instances))
        .routes(routes!(instances::add_instance))
        .routes(routes!(instances::update_instance))
        .routes(routes!(instances::delete_instance))
        .routes(routes!(instances::validate_app_token));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Signup, login, tokens and password reset".to_string());

    let mut account_tag = Tag::new("account");
    account_tag.description = Some("Account and profile management".to_string());

    let mut temp_token_tag = Tag::new("temp-token");
    temp_token_tag.description = Some("Capability tokens for out-of-band flows".to_string());

    let mut instances_tag = Tag::new("instances");
    instances_tag.description = Some("Study instance registry".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, account_tag, temp_token_tag, instances_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    let components = ComponentsBuilder::new()
        .security_scheme(
            "bearer_token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        )
        .build();

    OpenApiBuilder::new()
        .info(info)
        .components(Some(components))
        .build()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn openapi_covers_core_endpoints() {
        let spec = openapi();
        for path in [
            "/v1/auth/signup",
            "/v1/auth/login",
            "/v1/auth/token/renew",
            "/v1/auth/password-reset/initiate",
            "/v1/user/password",
            "/v1/user/account-id",
            "/v1/temp-token",
            "/v1/instances",
            "/v1/app-token/validate",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "missing path: {path}"
            );
        }
    }
}
