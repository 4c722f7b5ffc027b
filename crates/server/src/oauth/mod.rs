//! OAuth2/OIDC token issuance.
//!
//! The token endpoint dispatches on `grant_type`:
//! - `password`: first factor only; verifies the password (with lockout) and
//!   dispatches a phone OTP code instead of issuing tokens
//! - `otp_code`: second factor; verifies the OTP code and issues tokens
//! - `client_credentials`: machine-to-machine tokens for registered clients
//! - `refresh_token`: rotates a stored refresh token and re-issues
//!
//! Access and identity tokens are signed JWTs; refresh tokens are opaque
//! database-backed strings rotated on use.

pub mod claims;
pub mod endpoints;
pub mod state;
pub mod tokens;

pub const OAUTH_TAG: &str = "oauth";

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_EMAIL: &str = "email";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_ROLES: &str = "roles";
pub const SCOPE_OFFLINE_ACCESS: &str = "offline_access";

/// Scopes granted to interactive users authenticating via the OTP grant.
pub const USER_SCOPES: &[&str] = &[
    SCOPE_OPENID,
    SCOPE_EMAIL,
    SCOPE_PROFILE,
    SCOPE_ROLES,
    SCOPE_OFFLINE_ACCESS,
];
