//! SeaORM entities backing the user store and application registry.

pub mod application;
pub mod otp_code;
pub mod password_reset_token;
pub mod refresh_token;
pub mod role;
pub mod user;
pub mod user_role;
