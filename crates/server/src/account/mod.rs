//! Account management: registration, password reset, OTP resend, profiles
//! and role administration.

mod service;

pub use service::{AccountService, NewAccount, UserProfile};
