//! The token endpoint.
//!
//! A single POST handler dispatches on `grant_type`. Client credentials are
//! accepted either via HTTP Basic auth or in the form body.

use crate::entity::refresh_token;
use crate::oauth::claims::ClaimsIdentity;
use crate::oauth::state::OAuthState;
use crate::oauth::tokens::IssuedTokens;
use crate::oauth::{OAUTH_TAG, SCOPE_OFFLINE_ACCESS, USER_SCOPES};
use crate::store::{PasswordCheck, verify_password};
use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router(state: OAuthState) -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(token)).with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// One-time code for the `otp_code` grant.
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// OAuth2 token endpoint.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH_TAG,
    operation_id = "Token",
    summary = "Exchange credentials for tokens",
    description = "Dispatches on `grant_type`:\n\n\
                   - `password`: verifies the password and dispatches a phone OTP code. \
                     No tokens are issued; this grant is the first factor only.\n\
                   - `otp_code`: verifies the OTP code sent after the password grant \
                     and issues access, identity and refresh tokens.\n\
                   - `client_credentials`: issues an access token for a registered \
                     client application.\n\
                   - `refresh_token`: rotates the presented refresh token and re-issues.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued (or OTP dispatched for the password grant)", body = TokenResponse),
        (status = 400, description = "Invalid request or rejected grant", body = ErrorResponse),
        (status = 401, description = "Invalid client credentials", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Response {
    match params.grant_type.as_str() {
        "otp_code" => handle_otp_code_grant(state, headers, params).await,
        "password" => handle_password_grant(state, params).await,
        "client_credentials" => handle_client_credentials_grant(state, headers, params).await,
        "refresh_token" => handle_refresh_token_grant(state, headers, params).await,
        _ => oauth_error(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            Some("The specified grant type is not implemented."),
        ),
    }
}

/// Second factor: verify the OTP code and issue tokens.
async fn handle_otp_code_grant(
    state: OAuthState,
    headers: HeaderMap,
    params: TokenRequest,
) -> Response {
    let Some(username) = params.username.as_deref() else {
        return invalid_request("username is required");
    };
    let Some(code) = params.code.as_deref() else {
        return invalid_request("code is required");
    };
    let (client_id, _) = extract_client_credentials(&headers, &params);
    let Some(client_id) = client_id else {
        return invalid_request("client_id is required");
    };

    // An unknown client application here is static misconfiguration of the
    // deployment, not a client error.
    let application = match state.applications.find_by_client_id(&client_id).await {
        Ok(Some(application)) => application,
        Ok(None) => {
            tracing::error!(client_id, "Client application not found");
            return oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                Some("The application cannot be found."),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Database error looking up application");
            return server_error();
        }
    };
    if !application.is_grant_type_allowed("otp_code") {
        return oauth_error(StatusCode::BAD_REQUEST, "unauthorized_client", None);
    }

    let user = match state.users.find_by_email(username).await {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_grant("The OTP code is invalid."),
        Err(e) => {
            tracing::error!(error = %e, "Database error looking up user");
            return server_error();
        }
    };

    match state.users.verify_otp(&user, code).await {
        Ok(true) => {}
        Ok(false) => return invalid_grant("The OTP code is invalid."),
        Err(e) => {
            tracing::error!(error = %e, "Failed to verify OTP code");
            return server_error();
        }
    }

    let roles = match state.users.roles_of(&user).await {
        Ok(roles) => roles,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load roles");
            return server_error();
        }
    };
    let mut identity = ClaimsIdentity::for_user(&user.id, &user.email, &user.full_name, &roles);
    identity.set_scopes(USER_SCOPES.iter().copied());

    issue_token_response(&state, &identity, &client_id, Some(&user.id)).await
}

/// First factor: verify the password (with lockout) and dispatch an OTP
/// code. User-not-found and wrong-password are indistinguishable to the
/// caller.
async fn handle_password_grant(state: OAuthState, params: TokenRequest) -> Response {
    const REJECTION: &str = "The username/password combination is invalid.";

    let Some(username) = params.username.as_deref() else {
        return invalid_request("username is required");
    };
    let Some(password) = params.password.as_deref() else {
        return invalid_request("password is required");
    };

    let user = match state.users.find_by_email(username).await {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_grant(REJECTION),
        Err(e) => {
            tracing::error!(error = %e, "Database error looking up user");
            return server_error();
        }
    };

    match state.users.check_password(&user, password, true).await {
        Ok(PasswordCheck::Success) => {}
        Ok(PasswordCheck::Failed | PasswordCheck::LockedOut) => return invalid_grant(REJECTION),
        Err(e) => {
            tracing::error!(error = %e, "Failed to check password");
            return server_error();
        }
    }

    let code = match state.users.generate_otp(&user).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Failed to generate OTP code");
            return server_error();
        }
    };
    state.mailer.notify_otp(&user.phone_number, &code);

    (StatusCode::OK, Json("OTP Code has been sent.")).into_response()
}

/// Machine-to-machine tokens for registered client applications.
async fn handle_client_credentials_grant(
    state: OAuthState,
    headers: HeaderMap,
    params: TokenRequest,
) -> Response {
    let (client_id, client_secret) = extract_client_credentials(&headers, &params);
    let Some(client_id) = client_id else {
        return invalid_request("client_id is required");
    };

    let application = match state.applications.find_by_client_id(&client_id).await {
        Ok(Some(application)) => application,
        Ok(None) => {
            tracing::error!(client_id, "Client application not found");
            return oauth_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                Some("The application cannot be found."),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Database error looking up application");
            return server_error();
        }
    };

    // Argon2 verification doubles as a constant-time comparison.
    match client_secret {
        Some(secret) if verify_password(&secret, &application.client_secret_hash) => {}
        _ => {
            return oauth_error(StatusCode::UNAUTHORIZED, "invalid_client", None);
        }
    }
    if !application.is_grant_type_allowed("client_credentials") {
        return oauth_error(StatusCode::BAD_REQUEST, "unauthorized_client", None);
    }

    let identity =
        ClaimsIdentity::for_application(&application.client_id, &application.display_name);

    issue_token_response(&state, &identity, &client_id, None).await
}

/// Rotate the presented refresh token and re-issue from the principal
/// embedded in it.
async fn handle_refresh_token_grant(
    state: OAuthState,
    headers: HeaderMap,
    params: TokenRequest,
) -> Response {
    const REJECTION: &str = "The refresh token is invalid or expired.";

    let Some(presented) = params.refresh_token.as_deref() else {
        return invalid_request("refresh_token is required");
    };
    let (client_id, _) = extract_client_credentials(&headers, &params);
    let Some(client_id) = client_id else {
        return invalid_request("client_id is required");
    };

    let existing = match refresh_token::Entity::find_by_id(presented)
        .one(state.db.as_ref())
        .await
    {
        Ok(Some(existing)) => existing,
        Ok(None) => return invalid_grant(REJECTION),
        Err(e) => {
            tracing::error!(error = %e, "Database error looking up refresh token");
            return server_error();
        }
    };
    if existing.client_id != client_id || !existing.is_valid() {
        return invalid_grant(REJECTION);
    }

    // Rotation: the presented token is revoked before its replacement is
    // issued, so a replayed token always fails.
    let mut revoked: refresh_token::ActiveModel = existing.clone().into();
    revoked.revoked_at = Set(Some(OffsetDateTime::now_utc()));
    if let Err(e) = revoked.update(state.db.as_ref()).await {
        tracing::error!(error = %e, "Failed to revoke refresh token");
        return server_error();
    }

    let identity = match rebuild_identity(&state, &existing).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return invalid_grant(REJECTION),
        Err(response) => return response,
    };

    issue_token_response(&state, &identity, &client_id, existing.user_id.as_deref()).await
}

/// Reconstruct the principal stored with a refresh token.
async fn rebuild_identity(
    state: &OAuthState,
    stored: &refresh_token::Model,
) -> Result<Option<ClaimsIdentity>, Response> {
    match &stored.user_id {
        Some(user_id) => {
            let user = match state.users.find_by_id(user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::error!(error = %e, "Database error looking up user");
                    return Err(server_error());
                }
            };
            let roles = match state.users.roles_of(&user).await {
                Ok(roles) => roles,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load roles");
                    return Err(server_error());
                }
            };
            let mut identity =
                ClaimsIdentity::for_user(&user.id, &user.email, &user.full_name, &roles);
            identity.set_scopes(stored.scopes_list());
            Ok(Some(identity))
        }
        None => {
            let application = match state.applications.find_by_client_id(&stored.client_id).await
            {
                Ok(Some(application)) => application,
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::error!(error = %e, "Database error looking up application");
                    return Err(server_error());
                }
            };
            Ok(Some(ClaimsIdentity::for_application(
                &application.client_id,
                &application.display_name,
            )))
        }
    }
}

/// Sign tokens for the identity and store a refresh token when the
/// `offline_access` scope was granted.
async fn issue_token_response(
    state: &OAuthState,
    identity: &ClaimsIdentity,
    client_id: &str,
    user_id: Option<&str>,
) -> Response {
    let IssuedTokens {
        access_token,
        id_token,
        expires_in,
    } = match state.issuer.issue(identity, client_id) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(error = %e, "Failed to sign tokens");
            return server_error();
        }
    };

    let refresh = if identity.has_scope(SCOPE_OFFLINE_ACCESS) {
        let now = OffsetDateTime::now_utc();
        let token = OAuthState::generate_token();
        let model = refresh_token::ActiveModel {
            token: Set(token.clone()),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.map(String::from)),
            scope: Set(identity.scopes().join(" ")),
            expires_at: Set(now + Duration::seconds(state.tokens.refresh_token_lifetime_secs)),
            revoked_at: Set(None),
            created_at: Set(now),
        };
        if let Err(e) = model.insert(state.db.as_ref()).await {
            tracing::error!(error = %e, "Failed to store refresh token");
            return server_error();
        }
        Some(token)
    } else {
        None
    };

    let scope = if identity.scopes().is_empty() {
        None
    } else {
        Some(identity.scopes().join(" "))
    };

    (
        StatusCode::OK,
        Json(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: refresh,
            id_token,
            scope,
        }),
    )
        .into_response()
}

fn extract_client_credentials(
    headers: &HeaderMap,
    params: &TokenRequest,
) -> (Option<String>, Option<String>) {
    // Basic auth takes precedence over the form body.
    if let Some(auth) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, auth)
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return (Some(id.to_string()), Some(secret.to_string()));
    }

    (params.client_id.clone(), params.client_secret.clone())
}

fn oauth_error(status: StatusCode, error: &str, description: Option<&str>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            error_description: description.map(String::from),
        }),
    )
        .into_response()
}

fn invalid_request(description: &str) -> Response {
    oauth_error(StatusCode::BAD_REQUEST, "invalid_request", Some(description))
}

fn invalid_grant(description: &str) -> Response {
    oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", Some(description))
}

fn server_error() -> Response {
    oauth_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
}
