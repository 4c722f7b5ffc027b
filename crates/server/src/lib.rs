//! A credential and identity backend.
//!
//! Provides account management (registration, password reset, phone OTP,
//! role assignment) and OAuth2/OIDC token issuance with password,
//! client-credentials, refresh-token and a custom OTP grant.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::oauth::tokens::TokenIssuer;

pub mod account;
pub mod api;
pub mod config;
pub mod email;
pub mod entity;
pub mod error;
pub mod oauth;
pub mod result;
pub mod seed;
pub mod store;

#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub issuer: Arc<TokenIssuer>,
}
