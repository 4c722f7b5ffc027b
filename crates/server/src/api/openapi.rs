//! OpenAPI/Utoipa configuration.

use crate::api::{account::ACCOUNT_TAG, health::MISC_TAG};
use crate::oauth::OAUTH_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, OAuth2, Password, Scopes, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Access token obtained from the `/connect/token` endpoint.",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            let oauth2 = OAuth2::new([utoipa::openapi::security::Flow::Password(Password::new(
                "/connect/token",
                Scopes::from_iter([
                    ("openid", "OpenID Connect scope"),
                    ("email", "Access to user email"),
                    ("profile", "Access to user profile"),
                    ("roles", "Access to user roles"),
                    ("offline_access", "Refresh token issuance"),
                ]),
            ))]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Identity Server API",
        version = "1.0.0",
        description = "Credential and identity backend: account management, password reset, \
                       phone OTP verification, role assignment and OAuth2/OIDC token issuance."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = ACCOUNT_TAG, description = "Account management endpoints"),
        (name = OAUTH_TAG, description = "OAuth2 token endpoints")
    )
)]
pub struct ApiDoc;
