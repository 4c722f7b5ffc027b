//! Shared state for the token endpoint.

use crate::config::TokenConfig;
use crate::email::Mailer;
use crate::oauth::tokens::TokenIssuer;
use crate::store::{ApplicationRegistry, UserStore};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuthState {
    pub db: Arc<DatabaseConnection>,
    pub users: UserStore,
    pub applications: ApplicationRegistry,
    pub issuer: Arc<TokenIssuer>,
    pub mailer: Mailer,
    pub tokens: TokenConfig,
}

impl OAuthState {
    /// Generate an opaque refresh token: 32 random bytes, URL-safe base64.
    pub fn generate_token() -> String {
        use base64::Engine;
        let mut bytes = [0u8; 32];
        getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }
}
