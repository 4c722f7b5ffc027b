//! API module providing the HTTP surface of the identity server.
//!
//! This module is organized into submodules:
//! - `account` - Account management endpoints (/api/account/*)
//! - `auth` - Bearer-token authentication extractor
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod account;
pub mod auth;
pub mod health;
pub mod openapi;

pub use account::ACCOUNT_TAG;
pub use health::MISC_TAG;

use crate::AppResources;
use crate::account::AccountService;
use crate::oauth::{self, state::OAuthState};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_redoc::{Redoc, Servable};

/// Build the full application router with all middleware layers attached.
pub fn build_router(
    account_service: AccountService,
    oauth_state: OAuthState,
    app_resources: AppResources,
) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/account", account::router(account_service))
        .nest("/connect", oauth::endpoints::router(oauth_state))
        .routes(routes!(health::health))
        .layer(axum::Extension(app_resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(account_service, oauth_state, app_resources))]
pub async fn start_webserver(
    account_service: AccountService,
    oauth_state: OAuthState,
    app_resources: AppResources,
) -> color_eyre::Result<()> {
    let router = build_router(account_service, oauth_state, app_resources);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!(addr = "0.0.0.0:8080", "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
