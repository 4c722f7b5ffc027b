//! Account management endpoints (/api/account/*).
//!
//! Every endpoint answers with the uniform result envelope; handlers do
//! shape validation only and delegate the rest to the account service.

use crate::account::{AccountService, NewAccount, UserProfile};
use crate::api::auth::BearerAuth;
use crate::error::ServiceError;
use crate::result::{ApiResponse, respond};
use axum::{
    Json,
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const ACCOUNT_TAG: &str = "Account";

pub fn router(service: AccountService) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(update_password))
        .routes(routes!(reset_password))
        .routes(routes!(send_otp_token))
        .routes(routes!(get_user_profile))
        .routes(routes!(assign_roles))
        .routes(routes!(create_role))
        .routes(routes!(get_roles))
        .with_state(service)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub phone_number: String,
    pub country_code: String,
    pub full_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SendOtpQuery {
    #[serde(rename = "userName")]
    pub user_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRolesRequest {
    pub user_id: String,
    pub roles: Vec<String>,
}

/// Register a new account.
#[tracing::instrument(skip(service, body), fields(email = %body.email))]
#[utoipa::path(
    post,
    path = "/register",
    tag = ACCOUNT_TAG,
    operation_id = "Register",
    summary = "Register a new user account",
    description = "Creates a user account with the given profile data and optional roles. \
                   The account starts with an unusable random password; a password-reset \
                   email lets the user choose their own. All requested roles must already \
                   exist.",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account registered", body = ApiResponse<String>),
        (status = 400, description = "Invalid input", body = ApiResponse<String>),
        (status = 409, description = "Email already registered or unknown role", body = ApiResponse<String>),
    )
)]
pub async fn register(
    State(service): State<AccountService>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    let mut errors = Vec::new();
    if body.email.is_empty() || !body.email.contains('@') {
        errors.push("A valid email is required".to_string());
    }
    if body.phone_number.is_empty() {
        errors.push("phoneNumber is required".to_string());
    }
    if body.full_name.is_empty() {
        errors.push("fullName is required".to_string());
    }
    if !errors.is_empty() {
        return respond::<()>(Err(ServiceError::BadRequest(errors)), "");
    }

    let result = service
        .register(NewAccount {
            email: body.email,
            phone_number: body.phone_number,
            country_code: body.country_code,
            full_name: body.full_name,
            roles: body.roles,
        })
        .await;
    respond(result, "Registration successful, email sent")
}

/// Set a new password using a reset token.
#[tracing::instrument(skip(service, body), fields(email = %body.email))]
#[utoipa::path(
    post,
    path = "/updatepassword",
    tag = ACCOUNT_TAG,
    operation_id = "Update Password",
    summary = "Set a new password using a reset token",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = ApiResponse<String>),
        (status = 400, description = "Invalid or expired token, or passwords do not match", body = ApiResponse<String>),
        (status = 404, description = "Unknown user", body = ApiResponse<String>),
    )
)]
pub async fn update_password(
    State(service): State<AccountService>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Response {
    if body.password.is_empty() {
        return respond::<()>(Err(ServiceError::bad_request("password is required")), "");
    }
    if body.password != body.confirm_password {
        return respond::<()>(Err(ServiceError::bad_request("Passwords do not match")), "");
    }

    let result = service
        .change_password(&body.email, &body.token, &body.password)
        .await;
    respond(result, "Password updated successfully")
}

/// Request a password-reset email.
#[tracing::instrument(skip(service, body), fields(email = %body.email))]
#[utoipa::path(
    post,
    path = "/resetpassword",
    tag = ACCOUNT_TAG,
    operation_id = "Reset Password",
    summary = "Send a password-reset email",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Reset email sent", body = ApiResponse<String>),
        (status = 404, description = "Unknown user", body = ApiResponse<String>),
    )
)]
pub async fn reset_password(
    State(service): State<AccountService>,
    Json(body): Json<ResetPasswordRequest>,
) -> Response {
    let result = service.forgot_password(&body.email).await;
    respond(result, "Password reset email sent successfully")
}

/// Generate and dispatch a fresh OTP code.
#[tracing::instrument(skip(service))]
#[utoipa::path(
    post,
    path = "/sendotptoken",
    tag = ACCOUNT_TAG,
    operation_id = "Send OTP Token",
    summary = "Re-send a phone OTP code",
    params(SendOtpQuery),
    responses(
        (status = 200, description = "OTP dispatched", body = ApiResponse<String>),
        (status = 404, description = "Unknown user", body = ApiResponse<String>),
    )
)]
pub async fn send_otp_token(
    State(service): State<AccountService>,
    Query(query): Query<SendOtpQuery>,
) -> Response {
    let result = service.resend_otp(&query.user_name).await;
    respond(result, "OTP sent successfully")
}

/// Profile of the authenticated user.
#[tracing::instrument(skip(service))]
#[utoipa::path(
    get,
    path = "/getuserprofile",
    tag = ACCOUNT_TAG,
    operation_id = "Get User Profile",
    summary = "Profile of the authenticated user",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = ApiResponse<UserProfile>),
        (status = 401, description = "Missing or invalid token", body = ApiResponse<String>),
        (status = 404, description = "Unknown user", body = ApiResponse<String>),
    )
)]
pub async fn get_user_profile(
    State(service): State<AccountService>,
    BearerAuth(user): BearerAuth,
) -> Response {
    let result = service.profile(&user.user_id).await;
    respond(result, "User profile retrieved successfully")
}

/// Grant roles to a user.
#[tracing::instrument(skip(service, body), fields(user_id = %body.user_id))]
#[utoipa::path(
    post,
    path = "/assignroles",
    tag = ACCOUNT_TAG,
    operation_id = "Assign Roles",
    summary = "Grant roles to a user",
    security(("bearer_auth" = [])),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "Roles assigned", body = ApiResponse<String>),
        (status = 400, description = "Unknown role in request", body = ApiResponse<String>),
        (status = 401, description = "Missing or invalid token", body = ApiResponse<String>),
        (status = 404, description = "Unknown user", body = ApiResponse<String>),
    )
)]
pub async fn assign_roles(
    State(service): State<AccountService>,
    BearerAuth(_user): BearerAuth,
    Json(body): Json<AssignRolesRequest>,
) -> Response {
    let result = service.assign_roles(&body.user_id, &body.roles).await;
    respond(result, "Roles assigned successfully")
}

/// Create a role. The body is the bare role name as a JSON string.
#[tracing::instrument(skip(service))]
#[utoipa::path(
    post,
    path = "/createrole",
    tag = ACCOUNT_TAG,
    operation_id = "Create Role",
    summary = "Create a new role",
    security(("bearer_auth" = [])),
    request_body = String,
    responses(
        (status = 200, description = "Role created", body = ApiResponse<String>),
        (status = 400, description = "Empty role name", body = ApiResponse<String>),
        (status = 401, description = "Missing or invalid token", body = ApiResponse<String>),
        (status = 409, description = "Role already exists", body = ApiResponse<String>),
    )
)]
pub async fn create_role(
    State(service): State<AccountService>,
    BearerAuth(_user): BearerAuth,
    Json(name): Json<String>,
) -> Response {
    if name.trim().is_empty() {
        return respond::<()>(Err(ServiceError::bad_request("Role name is required")), "");
    }

    let result = service.create_role(name.trim()).await;
    respond(result, "Role created successfully")
}

/// List all roles.
#[tracing::instrument(skip(service))]
#[utoipa::path(
    get,
    path = "/getroles",
    tag = ACCOUNT_TAG,
    operation_id = "Get Roles",
    summary = "List all roles",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All role names", body = ApiResponse<Vec<String>>),
        (status = 401, description = "Missing or invalid token", body = ApiResponse<String>),
    )
)]
pub async fn get_roles(
    State(service): State<AccountService>,
    BearerAuth(_user): BearerAuth,
) -> Response {
    let result = service.roles().await;
    respond(result, "Roles retrieved successfully")
}
