use crate::email::Mailer;
use crate::error::ServiceError;
use crate::store::credentials::generate_throwaway_password;
use crate::store::{NewUser, UserStore};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Registration input, already shape-validated by the API layer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub phone_number: String,
    pub country_code: String,
    pub full_name: String,
    pub roles: Vec<String>,
}

/// Profile projection returned to authenticated callers. Never exposes
/// credential material.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub country_code: String,
    pub phone_number: String,
    pub full_name: String,
    pub roles: Vec<String>,
}

#[derive(Clone)]
pub struct AccountService {
    users: UserStore,
    mailer: Mailer,
}

impl AccountService {
    pub fn new(users: UserStore, mailer: Mailer) -> Self {
        Self { users, mailer }
    }

    /// Register a new account.
    ///
    /// The account is created with a random throwaway password that is never
    /// communicated anywhere; the user takes ownership through the
    /// password-reset email sent at the end. Requested roles must all exist
    /// beforehand, and nothing is created when any of them is unknown.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: NewAccount) -> Result<(), ServiceError> {
        // Role validation comes first; with both defects present the caller
        // sees the role rejection.
        let missing = self.missing_roles(&account.roles).await?;
        if !missing.is_empty() {
            warn!(?missing, "Registration rejected, unknown roles");
            return Err(ServiceError::AlreadyExist(
                missing
                    .into_iter()
                    .map(|name| format!("Role {name} does not exist"))
                    .collect(),
            ));
        }

        if self.users.find_by_email(&account.email).await?.is_some() {
            warn!("Registration rejected, email already taken");
            return Err(ServiceError::already_exist("User already exists"));
        }

        let roles = self.users.find_roles_by_names(&account.roles).await?;
        let user = self
            .users
            .create(
                NewUser {
                    email: account.email.clone(),
                    phone_number: account.phone_number,
                    country_code: account.country_code,
                    full_name: account.full_name,
                },
                &generate_throwaway_password(),
            )
            .await?;
        self.users.add_to_roles(&user, &roles).await?;

        let token = self.users.generate_password_reset_token(&user).await?;
        self.mailer.send_password_reset(&account.email, &token).await;

        info!(user_id = %user.id, "Registered new account");
        Ok(())
    }

    /// Issue a password-reset token and email the reset link.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User does not exist"))?;

        let token = self.users.generate_password_reset_token(&user).await?;
        self.mailer.send_password_reset(email, &token).await;

        info!(user_id = %user.id, "Issued password-reset token");
        Ok(())
    }

    /// Set a new password using a reset token. The token is single-use and
    /// must be unexpired.
    #[instrument(skip(self, token, new_password))]
    pub async fn change_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User does not exist"))?;

        self.users.reset_password(&user, token, new_password).await?;

        info!(user_id = %user.id, "Password changed via reset token");
        Ok(())
    }

    /// Generate a fresh phone OTP code for the user and hand it to the
    /// notification hook. Outstanding codes are invalidated.
    #[instrument(skip(self))]
    pub async fn resend_otp(&self, user_name: &str) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_email(user_name)
            .await?
            .ok_or_else(|| ServiceError::not_found("User does not exist"))?;

        let code = self.users.generate_otp(&user).await?;
        self.mailer.notify_otp(&user.phone_number, &code);

        Ok(())
    }

    /// Profile projection for the given user id.
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, ServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User does not exist"))?;
        let roles = self.users.roles_of(&user).await?;

        Ok(UserProfile {
            user_id: user.id,
            email: user.email,
            country_code: user.country_code,
            phone_number: user.phone_number,
            full_name: user.full_name,
            roles,
        })
    }

    /// Grant roles to an existing user. All requested roles must exist;
    /// no membership is written when any of them is unknown.
    #[instrument(skip(self, roles))]
    pub async fn assign_roles(
        &self,
        user_id: &str,
        roles: &[String],
    ) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User does not exist"))?;

        let missing = self.missing_roles(roles).await?;
        if !missing.is_empty() {
            warn!(?missing, "Role assignment rejected, unknown roles");
            return Err(ServiceError::BadRequest(
                missing
                    .into_iter()
                    .map(|name| format!("Role {name} does not exist"))
                    .collect(),
            ));
        }

        let resolved = self.users.find_roles_by_names(roles).await?;
        self.users.add_to_roles(&user, &resolved).await?;

        info!(user_id = %user.id, "Assigned roles");
        Ok(())
    }

    /// Create a role; duplicates are rejected by the unique name constraint.
    #[instrument(skip(self))]
    pub async fn create_role(&self, name: &str) -> Result<(), ServiceError> {
        self.users.create_role(name).await?;
        info!(role = name, "Created role");
        Ok(())
    }

    pub async fn roles(&self) -> Result<Vec<String>, ServiceError> {
        self.users.list_roles().await
    }

    async fn missing_roles(&self, requested: &[String]) -> Result<Vec<String>, ServiceError> {
        let found = self.users.find_roles_by_names(requested).await?;
        Ok(requested
            .iter()
            .filter(|name| !found.iter().any(|r| &r.name == *name))
            .cloned()
            .collect())
    }
}
