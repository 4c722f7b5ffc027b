//! Credential store seams.
//!
//! The account service and the grant dispatcher never touch SeaORM entities
//! directly; they go through two narrow interfaces:
//!
//! - [`UserStore`] - lookup, password verification with lockout, reset-token
//!   and phone-OTP generation/consumption, role membership
//! - [`ApplicationRegistry`] - OAuth client application lookup and creation
//!
//! Both are thin wrappers over the database connection; all cryptographic
//! work (Argon2id hashing, secure randomness) is delegated to library calls.

pub mod applications;
pub mod credentials;
pub mod users;

pub use applications::ApplicationRegistry;
pub use credentials::{generate_otp_code, generate_reset_token, hash_password, verify_password};
pub use users::{NewUser, PasswordCheck, UserStore};
