use super::handlers::{accounts, auth, health, memberships, promotions};
use utoipa::{
    Modify, OpenApi,
    openapi::{
        Components,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};

/// `OpenAPI` document for every routed endpoint.
///
/// Add new endpoints to `paths(...)` when routing them in `api::router`.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login::login,
        auth::login::account,
        auth::password::forgot_password,
        auth::password::set_password,
        promotions::redeem::permission,
        promotions::redeem::redeem,
        promotions::manage::create,
        promotions::manage::update,
        promotions::manage::delete,
        promotions::manage::list_by_organization,
        accounts::redemptions,
        accounts::promotion_redemptions,
        memberships::grant::grant,
        memberships::grant::revoke,
        memberships::accounts::list,
        memberships::accounts::update,
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "auth", description = "Login, password reset and the current account"),
        (name = "promotions", description = "Promotion management, entitlement and redemption"),
        (name = "organizations", description = "Promotions owned by an organization"),
        (name = "accounts", description = "Redemption history"),
        (name = "memberships", description = "Membership tier administration")
    )
)]
struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Components::new);
        components.add_security_scheme(
            "basic",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
        );
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn openapi_tags_paths_and_security() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "promotions"));
        assert!(spec.paths.paths.contains_key("/v1/auth/login"));
        assert!(spec.paths.paths.contains_key("/v1/promotions/{id}/redeem"));
        assert!(spec.paths.paths.contains_key("/v1/promotions/{id}"));
        assert!(
            spec.paths
                .paths
                .contains_key("/v1/organizations/{id}/promotions")
        );
        assert!(
            spec.paths
                .paths
                .contains_key("/v1/memberships/{id}/accounts/{account_id}")
        );

        let schemes = spec
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("basic"));
        assert!(schemes.contains_key("bearer"));
    }
}
