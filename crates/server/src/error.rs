use thiserror::Error;

/// Error half of every account-service operation.
///
/// Operations return `Result<T, ServiceError>`; the wire envelope in
/// [`crate::result`] is only materialized at the HTTP boundary, so `Data`
/// can never be populated on a failure path.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request")]
    BadRequest(Vec<String>),
    /// Duplicate registration or duplicate role. The register path also
    /// reports a missing role under this variant to preserve the original
    /// wire contract.
    #[error("already exists")]
    AlreadyExist(Vec<String>),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Unexpected failure. The detail is logged server-side; only a generic
    /// message crosses the trust boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(vec![message.into()])
    }

    pub fn already_exist(message: impl Into<String>) -> Self {
        Self::AlreadyExist(vec![message.into()])
    }

    /// Messages safe to surface to the caller.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::NotFound(what) => vec![what.clone()],
            Self::BadRequest(msgs) | Self::AlreadyExist(msgs) => msgs.clone(),
            Self::Unauthenticated(msg) | Self::Unauthorized(msg) => vec![msg.clone()],
            Self::Internal(_) => {
                vec!["An error occurred while processing your request".to_string()]
            }
        }
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for ServiceError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
