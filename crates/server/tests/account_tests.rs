//! Account endpoint tests.
//!
//! Exercises registration, password reset, OTP resend, profiles and role
//! administration against an in-memory database.

use axum_test::TestServer;
use identity_server::{
    AppResources,
    account::AccountService,
    config::{AppConfig, ClientSeedConfig, SigningConfig, TokenConfig},
    email::Mailer,
    entity::{password_reset_token, user},
    oauth::claims::ClaimsIdentity,
    oauth::state::OAuthState,
    oauth::tokens::TokenIssuer,
    oauth::USER_SCOPES,
    store::{ApplicationRegistry, UserStore},
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, PaginatorTrait, Statement,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Create a test database with the identity schema.
async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    let ddl = [
        r#"CREATE TABLE users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            phone_number TEXT NOT NULL,
            country_code TEXT NOT NULL,
            full_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            access_failed_count INTEGER NOT NULL DEFAULT 0,
            lockout_end TEXT NULL,
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );"#,
        r#"CREATE TABLE user_roles (
            user_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            PRIMARY KEY (user_id, role_id)
        );"#,
        r#"CREATE TABLE applications (
            client_id TEXT PRIMARY KEY,
            client_secret_hash TEXT NOT NULL,
            display_name TEXT NOT NULL,
            grant_types TEXT NOT NULL DEFAULT 'password',
            scopes TEXT NOT NULL DEFAULT 'openid',
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE password_reset_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            consumed_at TEXT NULL,
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE otp_codes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            code_hash TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            consumed_at TEXT NULL,
            created_at TEXT NOT NULL
        );"#,
        r#"CREATE TABLE refresh_tokens (
            token TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            user_id TEXT NULL,
            scope TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            revoked_at TEXT NULL,
            created_at TEXT NOT NULL
        );"#,
    ];
    for statement in ddl {
        db.execute(Statement::from_string(DbBackend::Sqlite, statement))
            .await
            .expect("create table");
    }

    db
}

fn create_test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        issuer_url: "http://localhost:8080".into(),
        frontend_url: "http://localhost:3000".into(),
        smtp: None,
        client_seed: ClientSeedConfig {
            client_id: "dev_client".into(),
            client_secret: "5A80C0B3-8FCE-4B46-A22C-934BDC9EC566".into(),
            display_name: "For development only".into(),
        },
        signing: SigningConfig {
            private_key_pem: None,
            public_key_pem: None,
            dev_secret: Some("0123456789abcdef0123456789abcdef".into()),
        },
        tokens: TokenConfig::default(),
    }
}

struct TestContext {
    db: Arc<DatabaseConnection>,
    users: UserStore,
    issuer: Arc<TokenIssuer>,
}

async fn create_test_app() -> (TestServer, TestContext) {
    let db = Arc::new(create_test_db().await);
    let config = Arc::new(create_test_config());
    let mailer = Mailer::new(None, &config.frontend_url).expect("build mailer");
    let issuer = Arc::new(
        TokenIssuer::from_config(
            &config.signing,
            &config.issuer_url,
            config.tokens.access_token_lifetime_secs,
        )
        .expect("build issuer"),
    );

    let users = UserStore::new(db.clone(), config.tokens.clone());
    let applications = ApplicationRegistry::new(db.clone());
    identity_server::seed::seed_default_client(&applications, &config.client_seed)
        .await
        .expect("seed client");

    let account_service = AccountService::new(users.clone(), mailer.clone());
    let oauth_state = OAuthState {
        db: db.clone(),
        users: users.clone(),
        applications,
        issuer: issuer.clone(),
        mailer,
        tokens: config.tokens.clone(),
    };
    let resources = AppResources {
        db: db.clone(),
        config,
        issuer: issuer.clone(),
    };

    let router = identity_server::api::build_router(account_service, oauth_state, resources);
    let server = TestServer::new(router).expect("create test server");

    (server, TestContext { db, users, issuer })
}

async fn create_user(ctx: &TestContext, email: &str, password: &str) -> user::Model {
    ctx.users
        .create(
            identity_server::store::NewUser {
                email: email.to_string(),
                phone_number: "5550100".to_string(),
                country_code: "+1".to_string(),
                full_name: "Test User".to_string(),
            },
            password,
        )
        .await
        .expect("create user")
}

fn bearer_for(ctx: &TestContext, user: &user::Model) -> String {
    let mut identity = ClaimsIdentity::for_user(&user.id, &user.email, &user.full_name, &[]);
    identity.set_scopes(USER_SCOPES.iter().copied());
    let tokens = ctx.issuer.issue(&identity, "dev_client").expect("issue");
    format!("Bearer {}", tokens.access_token)
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn register_creates_user_and_reset_token() {
    let (server, ctx) = create_test_app().await;

    let response = server
        .post("/api/account/register")
        .json(&serde_json::json!({
            "email": "alice@example.com",
            "phoneNumber": "5550100",
            "countryCode": "+1",
            "fullName": "Alice Example"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["Version"], "1.0");
    assert_eq!(body["StatusCode"], "Success");
    assert_eq!(body["SuccessMessage"], "Registration successful, email sent");
    assert!(body.get("TimeStamp").is_some());

    let user = ctx
        .users
        .find_by_email("alice@example.com")
        .await
        .expect("lookup")
        .expect("user exists");

    let tokens = password_reset_token::Entity::find()
        .all(ctx.db.as_ref())
        .await
        .expect("list tokens");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].user_id, user.id);
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let (server, _ctx) = create_test_app().await;

    let body = serde_json::json!({
        "email": "bob@example.com",
        "phoneNumber": "5550100",
        "countryCode": "+1",
        "fullName": "Bob Example"
    });

    server.post("/api/account/register").json(&body).await.assert_status_ok();

    let response = server.post("/api/account/register").json(&body).await;
    response.assert_status(axum::http::StatusCode::CONFLICT);
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["StatusCode"], "AlreadyExist");
    assert!(envelope.get("Data").is_none());
}

#[tokio::test]
async fn register_unknown_role_rejects_without_creating_user() {
    let (server, ctx) = create_test_app().await;

    let response = server
        .post("/api/account/register")
        .json(&serde_json::json!({
            "email": "carol@example.com",
            "phoneNumber": "5550100",
            "countryCode": "+1",
            "fullName": "Carol Example",
            "roles": ["does-not-exist"]
        }))
        .await;

    // Historical contract: a missing role on registration is reported under
    // the AlreadyExist status.
    response.assert_status(axum::http::StatusCode::CONFLICT);
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["StatusCode"], "AlreadyExist");
    let errors = envelope["ErrorMessages"].as_array().expect("errors");
    assert!(errors[0].as_str().unwrap().contains("does-not-exist"));

    let count = user::Entity::find().count(ctx.db.as_ref()).await.expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn register_duplicate_email_with_unknown_role_reports_the_role() {
    let (server, _ctx) = create_test_app().await;

    server
        .post("/api/account/register")
        .json(&serde_json::json!({
            "email": "taken@example.com",
            "phoneNumber": "5550100",
            "countryCode": "+1",
            "fullName": "First Registration"
        }))
        .await
        .assert_status_ok();

    // Role validation runs before the duplicate-email check, so the role
    // rejection wins when both apply.
    let response = server
        .post("/api/account/register")
        .json(&serde_json::json!({
            "email": "taken@example.com",
            "phoneNumber": "5550100",
            "countryCode": "+1",
            "fullName": "Second Registration",
            "roles": ["ghost"]
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
    let envelope: serde_json::Value = response.json();
    assert_eq!(
        envelope["ErrorMessages"][0].as_str().unwrap(),
        "Role ghost does not exist"
    );
}

#[tokio::test]
async fn register_assigns_existing_roles() {
    let (server, ctx) = create_test_app().await;
    ctx.users.create_role("admin").await.expect("create role");

    server
        .post("/api/account/register")
        .json(&serde_json::json!({
            "email": "dave@example.com",
            "phoneNumber": "5550100",
            "countryCode": "+1",
            "fullName": "Dave Example",
            "roles": ["admin"]
        }))
        .await
        .assert_status_ok();

    let user = ctx
        .users
        .find_by_email("dave@example.com")
        .await
        .expect("lookup")
        .expect("user exists");
    let roles = ctx.users.roles_of(&user).await.expect("roles");
    assert_eq!(roles, vec!["admin".to_string()]);
}

#[tokio::test]
async fn register_rejects_malformed_input() {
    let (server, _ctx) = create_test_app().await;

    let response = server
        .post("/api/account/register")
        .json(&serde_json::json!({
            "email": "not-an-email",
            "phoneNumber": "",
            "countryCode": "+1",
            "fullName": ""
        }))
        .await;

    response.assert_status_bad_request();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["StatusCode"], "BadRequest");
    assert_eq!(envelope["ErrorMessages"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Password reset
// =============================================================================

#[tokio::test]
async fn update_password_with_valid_token() {
    let (server, ctx) = create_test_app().await;
    let user = create_user(&ctx, "erin@example.com", "old-password-1!").await;
    let token = ctx
        .users
        .generate_password_reset_token(&user)
        .await
        .expect("reset token");

    let response = server
        .post("/api/account/updatepassword")
        .json(&serde_json::json!({
            "email": "erin@example.com",
            "password": "new-password-1!",
            "confirmPassword": "new-password-1!",
            "token": token
        }))
        .await;

    response.assert_status_ok();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["SuccessMessage"], "Password updated successfully");

    let user = ctx
        .users
        .find_by_email("erin@example.com")
        .await
        .expect("lookup")
        .expect("user");
    let check = ctx
        .users
        .check_password(&user, "new-password-1!", false)
        .await
        .expect("check");
    assert_eq!(check, identity_server::store::PasswordCheck::Success);
}

#[tokio::test]
async fn update_password_token_is_single_use() {
    let (server, ctx) = create_test_app().await;
    let user = create_user(&ctx, "frank@example.com", "old-password-1!").await;
    let token = ctx
        .users
        .generate_password_reset_token(&user)
        .await
        .expect("reset token");

    let body = serde_json::json!({
        "email": "frank@example.com",
        "password": "new-password-1!",
        "confirmPassword": "new-password-1!",
        "token": token
    });

    server.post("/api/account/updatepassword").json(&body).await.assert_status_ok();

    let replay = server.post("/api/account/updatepassword").json(&body).await;
    replay.assert_status_bad_request();
    let envelope: serde_json::Value = replay.json();
    assert_eq!(envelope["StatusCode"], "BadRequest");
}

#[tokio::test]
async fn update_password_rejects_expired_token() {
    let (server, ctx) = create_test_app().await;
    let user = create_user(&ctx, "grace@example.com", "old-password-1!").await;

    let now = OffsetDateTime::now_utc();
    password_reset_token::ActiveModel {
        token: Set("expired-token".to_string()),
        user_id: Set(user.id.clone()),
        expires_at: Set(now - Duration::hours(1)),
        consumed_at: Set(None),
        created_at: Set(now - Duration::hours(25)),
    }
    .insert(ctx.db.as_ref())
    .await
    .expect("insert token");

    let response = server
        .post("/api/account/updatepassword")
        .json(&serde_json::json!({
            "email": "grace@example.com",
            "password": "new-password-1!",
            "confirmPassword": "new-password-1!",
            "token": "expired-token"
        }))
        .await;

    response.assert_status_bad_request();

    // The rejected reset leaves the prior password valid.
    let user = ctx
        .users
        .find_by_email("grace@example.com")
        .await
        .expect("lookup")
        .expect("user");
    let check = ctx
        .users
        .check_password(&user, "old-password-1!", false)
        .await
        .expect("check");
    assert_eq!(check, identity_server::store::PasswordCheck::Success);
}

#[tokio::test]
async fn update_password_rejects_mismatched_confirmation() {
    let (server, ctx) = create_test_app().await;
    let user = create_user(&ctx, "henry@example.com", "old-password-1!").await;
    let token = ctx
        .users
        .generate_password_reset_token(&user)
        .await
        .expect("reset token");

    let response = server
        .post("/api/account/updatepassword")
        .json(&serde_json::json!({
            "email": "henry@example.com",
            "password": "new-password-1!",
            "confirmPassword": "different-password",
            "token": token
        }))
        .await;

    response.assert_status_bad_request();
    let envelope: serde_json::Value = response.json();
    assert_eq!(
        envelope["ErrorMessages"][0].as_str().unwrap(),
        "Passwords do not match"
    );
}

#[tokio::test]
async fn reset_password_unknown_user_is_not_found() {
    let (server, _ctx) = create_test_app().await;

    let response = server
        .post("/api/account/resetpassword")
        .json(&serde_json::json!({"email": "nobody@example.com"}))
        .await;

    response.assert_status_not_found();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["StatusCode"], "NotFound");
}

#[tokio::test]
async fn reset_password_issues_token() {
    let (server, ctx) = create_test_app().await;
    let user = create_user(&ctx, "iris@example.com", "password-1!").await;

    let response = server
        .post("/api/account/resetpassword")
        .json(&serde_json::json!({"email": "iris@example.com"}))
        .await;

    response.assert_status_ok();
    let envelope: serde_json::Value = response.json();
    assert_eq!(
        envelope["SuccessMessage"],
        "Password reset email sent successfully"
    );

    let tokens = password_reset_token::Entity::find()
        .all(ctx.db.as_ref())
        .await
        .expect("list tokens");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].user_id, user.id);
}

// =============================================================================
// OTP resend
// =============================================================================

#[tokio::test]
async fn send_otp_token_stores_hashed_code() {
    let (server, ctx) = create_test_app().await;
    create_user(&ctx, "judy@example.com", "password-1!").await;

    let response = server
        .post("/api/account/sendotptoken")
        .add_query_param("userName", "judy@example.com")
        .await;

    response.assert_status_ok();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["SuccessMessage"], "OTP sent successfully");

    let codes = identity_server::entity::otp_code::Entity::find()
        .all(ctx.db.as_ref())
        .await
        .expect("list codes");
    assert_eq!(codes.len(), 1);
    // Only the Argon2 hash is stored, never the raw digits.
    assert!(codes[0].code_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn send_otp_token_unknown_user_is_not_found() {
    let (server, _ctx) = create_test_app().await;

    let response = server
        .post("/api/account/sendotptoken")
        .add_query_param("userName", "nobody@example.com")
        .await;

    response.assert_status_not_found();
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn get_user_profile_requires_authentication() {
    let (server, _ctx) = create_test_app().await;

    let response = server.get("/api/account/getuserprofile").await;
    response.assert_status_unauthorized();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["StatusCode"], "Unauthenticated");
}

#[tokio::test]
async fn get_user_profile_returns_projection() {
    let (server, ctx) = create_test_app().await;
    ctx.users.create_role("auditor").await.expect("create role");
    let user = create_user(&ctx, "kate@example.com", "password-1!").await;
    let roles = ctx
        .users
        .find_roles_by_names(&["auditor".to_string()])
        .await
        .expect("roles");
    ctx.users.add_to_roles(&user, &roles).await.expect("assign");

    let response = server
        .get("/api/account/getuserprofile")
        .add_header("authorization", bearer_for(&ctx, &user))
        .await;

    response.assert_status_ok();
    let envelope: serde_json::Value = response.json();
    let data = &envelope["Data"];
    assert_eq!(data["userId"], user.id);
    assert_eq!(data["email"], "kate@example.com");
    assert_eq!(data["countryCode"], "+1");
    assert_eq!(data["phoneNumber"], "5550100");
    assert_eq!(data["fullName"], "Test User");
    assert_eq!(data["roles"], serde_json::json!(["auditor"]));
    // Credential material never crosses the boundary.
    assert!(data.get("passwordHash").is_none());
}

#[tokio::test]
async fn get_user_profile_rejects_garbage_token() {
    let (server, _ctx) = create_test_app().await;

    let response = server
        .get("/api/account/getuserprofile")
        .add_header("authorization", "Bearer not-a-jwt")
        .await;

    response.assert_status_unauthorized();
}

// =============================================================================
// Roles
// =============================================================================

#[tokio::test]
async fn assign_roles_unknown_role_is_bad_request_with_no_partial_grant() {
    let (server, ctx) = create_test_app().await;
    ctx.users.create_role("admin").await.expect("create role");
    let caller = create_user(&ctx, "leo@example.com", "password-1!").await;
    let target = create_user(&ctx, "mia@example.com", "password-1!").await;

    let response = server
        .post("/api/account/assignroles")
        .add_header("authorization", bearer_for(&ctx, &caller))
        .json(&serde_json::json!({
            "userId": target.id,
            "roles": ["admin", "ghost"]
        }))
        .await;

    // Unknown roles on assignment are a BadRequest, unlike registration.
    response.assert_status_bad_request();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["StatusCode"], "BadRequest");

    let roles = ctx.users.roles_of(&target).await.expect("roles");
    assert!(roles.is_empty());
}

#[tokio::test]
async fn assign_roles_grants_membership() {
    let (server, ctx) = create_test_app().await;
    ctx.users.create_role("admin").await.expect("create role");
    ctx.users.create_role("auditor").await.expect("create role");
    let caller = create_user(&ctx, "nina@example.com", "password-1!").await;
    let target = create_user(&ctx, "oscar@example.com", "password-1!").await;

    let response = server
        .post("/api/account/assignroles")
        .add_header("authorization", bearer_for(&ctx, &caller))
        .json(&serde_json::json!({
            "userId": target.id,
            "roles": ["admin", "auditor"]
        }))
        .await;

    response.assert_status_ok();
    let envelope: serde_json::Value = response.json();
    assert_eq!(envelope["SuccessMessage"], "Roles assigned successfully");

    let mut roles = ctx.users.roles_of(&target).await.expect("roles");
    roles.sort();
    assert_eq!(roles, vec!["admin".to_string(), "auditor".to_string()]);
}

#[tokio::test]
async fn assign_roles_unknown_user_is_not_found() {
    let (server, ctx) = create_test_app().await;
    let caller = create_user(&ctx, "pam@example.com", "password-1!").await;

    let response = server
        .post("/api/account/assignroles")
        .add_header("authorization", bearer_for(&ctx, &caller))
        .json(&serde_json::json!({
            "userId": "missing-user",
            "roles": []
        }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn create_role_rejects_duplicates_and_empty_names() {
    let (server, ctx) = create_test_app().await;
    let caller = create_user(&ctx, "quinn@example.com", "password-1!").await;
    let auth = bearer_for(&ctx, &caller);

    server
        .post("/api/account/createrole")
        .add_header("authorization", auth.clone())
        .json(&"support")
        .await
        .assert_status_ok();

    let duplicate = server
        .post("/api/account/createrole")
        .add_header("authorization", auth.clone())
        .json(&"support")
        .await;
    duplicate.assert_status(axum::http::StatusCode::CONFLICT);
    let envelope: serde_json::Value = duplicate.json();
    assert_eq!(envelope["StatusCode"], "AlreadyExist");

    let empty = server
        .post("/api/account/createrole")
        .add_header("authorization", auth)
        .json(&"   ")
        .await;
    empty.assert_status_bad_request();
}

#[tokio::test]
async fn get_roles_lists_all_roles() {
    let (server, ctx) = create_test_app().await;
    ctx.users.create_role("admin").await.expect("create role");
    ctx.users.create_role("support").await.expect("create role");
    let caller = create_user(&ctx, "rita@example.com", "password-1!").await;

    let response = server
        .get("/api/account/getroles")
        .add_header("authorization", bearer_for(&ctx, &caller))
        .await;

    response.assert_status_ok();
    let envelope: serde_json::Value = response.json();
    let mut roles: Vec<String> = envelope["Data"]
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    roles.sort();
    assert_eq!(roles, vec!["admin".to_string(), "support".to_string()]);
}

// =============================================================================
// Misc
// =============================================================================

#[tokio::test]
async fn seeding_is_idempotent_across_restarts() {
    // create_test_app already seeds once; two more rounds stand in for
    // process restarts against the same database.
    let (_server, ctx) = create_test_app().await;
    let registry = ApplicationRegistry::new(ctx.db.clone());
    let seed = ClientSeedConfig {
        client_id: "dev_client".into(),
        client_secret: "5A80C0B3-8FCE-4B46-A22C-934BDC9EC566".into(),
        display_name: "For development only".into(),
    };

    identity_server::seed::seed_default_client(&registry, &seed)
        .await
        .expect("reseed");
    identity_server::seed::seed_default_client(&registry, &seed)
        .await
        .expect("reseed");

    let count = identity_server::entity::application::Entity::find()
        .count(ctx.db.as_ref())
        .await
        .expect("count");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn healthz_responds_ok() {
    let (server, _ctx) = create_test_app().await;

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");
}
