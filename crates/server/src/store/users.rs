//! User store - credential repository keyed by user identifier.
//!
//! Owns password verification (with lockout), password-reset tokens, the
//! phone-based OTP second factor and role membership. Uniqueness of emails
//! and role names is enforced by database constraints, not by the
//! check-then-insert sequences here; concurrent creators race safely into a
//! unique-violation error.

use crate::config::TokenConfig;
use crate::entity::{otp_code, password_reset_token, role, user, user_role};
use crate::error::ServiceError;
use crate::store::credentials::{
    generate_otp_code, generate_reset_token, hash_password, verify_password,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    ModelTrait, QueryFilter, sea_query::OnConflict,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Failed password attempts before the account locks.
const MAX_ACCESS_FAILED: i32 = 5;
/// Lockout window once the threshold is reached.
const LOCKOUT_MINUTES: i64 = 5;

/// Outcome of a password check with lockout accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    Success,
    Failed,
    LockedOut,
}

/// Fields required to create a user; the password is supplied separately.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub phone_number: String,
    pub country_code: String,
    pub full_name: String,
}

#[derive(Clone)]
pub struct UserStore {
    db: Arc<DatabaseConnection>,
    tokens: TokenConfig,
}

impl UserStore {
    pub fn new(db: Arc<DatabaseConnection>, tokens: TokenConfig) -> Self {
        Self { db, tokens }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find_by_id(id).one(self.db.as_ref()).await?)
    }

    /// Create a user with the given password. A unique-violation on the
    /// email column surfaces as `AlreadyExist`.
    pub async fn create(
        &self,
        new_user: NewUser,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let password_hash = hash_password(password)?;
        let model = user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(new_user.email),
            phone_number: Set(new_user.phone_number),
            country_code: Set(new_user.country_code),
            full_name: Set(new_user.full_name),
            password_hash: Set(password_hash),
            access_failed_count: Set(0),
            lockout_end: Set(None),
            created_at: Set(OffsetDateTime::now_utc()),
        };
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::already_exist("User already exists")
            } else {
                ServiceError::from(e)
            }
        })
    }

    /// Verify a password, optionally counting failures towards lockout.
    ///
    /// A locked account fails verification even with the correct password.
    /// A successful check resets the failure counter.
    pub async fn check_password(
        &self,
        user: &user::Model,
        password: &str,
        lockout_on_failure: bool,
    ) -> Result<PasswordCheck, ServiceError> {
        if user.is_locked_out() {
            return Ok(PasswordCheck::LockedOut);
        }

        if verify_password(password, &user.password_hash) {
            if user.access_failed_count > 0 || user.lockout_end.is_some() {
                let mut active: user::ActiveModel = user.clone().into();
                active.access_failed_count = Set(0);
                active.lockout_end = Set(None);
                active.update(self.db.as_ref()).await?;
            }
            return Ok(PasswordCheck::Success);
        }

        if lockout_on_failure {
            let failed = user.access_failed_count + 1;
            let mut active: user::ActiveModel = user.clone().into();
            if failed >= MAX_ACCESS_FAILED {
                active.access_failed_count = Set(0);
                active.lockout_end =
                    Set(Some(OffsetDateTime::now_utc() + Duration::minutes(LOCKOUT_MINUTES)));
            } else {
                active.access_failed_count = Set(failed);
            }
            active.update(self.db.as_ref()).await?;
        }

        Ok(PasswordCheck::Failed)
    }

    /// Generate a single-use password-reset token for the user.
    pub async fn generate_password_reset_token(
        &self,
        user: &user::Model,
    ) -> Result<String, ServiceError> {
        let token = generate_reset_token();
        let now = OffsetDateTime::now_utc();
        let model = password_reset_token::ActiveModel {
            token: Set(token.clone()),
            user_id: Set(user.id.clone()),
            expires_at: Set(now + Duration::seconds(self.tokens.reset_token_lifetime_secs)),
            consumed_at: Set(None),
            created_at: Set(now),
        };
        model.insert(self.db.as_ref()).await?;
        Ok(token)
    }

    /// Apply a reset token and set a new password.
    ///
    /// The token must belong to the user, be unconsumed and unexpired; it is
    /// consumed on success, and the lockout state is cleared.
    pub async fn reset_password(
        &self,
        user: &user::Model,
        token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let row = password_reset_token::Entity::find_by_id(token)
            .one(self.db.as_ref())
            .await?;

        let row = match row {
            Some(row) if row.user_id == user.id && row.is_usable() => row,
            _ => return Err(ServiceError::bad_request("Invalid or expired reset token")),
        };

        let now = OffsetDateTime::now_utc();
        let mut consumed: password_reset_token::ActiveModel = row.into();
        consumed.consumed_at = Set(Some(now));
        consumed.update(self.db.as_ref()).await?;

        let password_hash = hash_password(new_password)?;
        let mut active: user::ActiveModel = user.clone().into();
        active.password_hash = Set(password_hash);
        active.access_failed_count = Set(0);
        active.lockout_end = Set(None);
        active.update(self.db.as_ref()).await?;

        Ok(())
    }

    /// Generate a phone OTP code for the user, invalidating any outstanding
    /// codes. Returns the plaintext digits for the notification hook; only
    /// the hash is stored.
    pub async fn generate_otp(&self, user: &user::Model) -> Result<String, ServiceError> {
        let now = OffsetDateTime::now_utc();

        otp_code::Entity::update_many()
            .col_expr(otp_code::Column::ConsumedAt, sea_orm::sea_query::Expr::value(now))
            .filter(otp_code::Column::UserId.eq(&user.id))
            .filter(otp_code::Column::ConsumedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        let code = generate_otp_code();
        let model = otp_code::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            user_id: Set(user.id.clone()),
            code_hash: Set(hash_password(&code)?),
            expires_at: Set(now + Duration::seconds(self.tokens.otp_lifetime_secs)),
            consumed_at: Set(None),
            created_at: Set(now),
        };
        model.insert(self.db.as_ref()).await?;

        Ok(code)
    }

    /// Verify a phone OTP code. The code is single-use: a successful check
    /// consumes it.
    pub async fn verify_otp(&self, user: &user::Model, code: &str) -> Result<bool, ServiceError> {
        let candidates = otp_code::Entity::find()
            .filter(otp_code::Column::UserId.eq(&user.id))
            .filter(otp_code::Column::ConsumedAt.is_null())
            .all(self.db.as_ref())
            .await?;

        for candidate in candidates {
            if candidate.is_usable() && verify_password(code, &candidate.code_hash) {
                let mut consumed: otp_code::ActiveModel = candidate.into();
                consumed.consumed_at = Set(Some(OffsetDateTime::now_utc()));
                consumed.update(self.db.as_ref()).await?;
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Role names the user is a member of.
    pub async fn roles_of(&self, user: &user::Model) -> Result<Vec<String>, ServiceError> {
        let roles = user
            .find_related(role::Entity)
            .all(self.db.as_ref())
            .await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    /// Resolve role models for the given names; the result may be shorter
    /// than the input when names are unknown.
    pub async fn find_roles_by_names(
        &self,
        names: &[String],
    ) -> Result<Vec<role::Model>, ServiceError> {
        Ok(role::Entity::find()
            .filter(role::Column::Name.is_in(names.iter().map(String::as_str)))
            .all(self.db.as_ref())
            .await?)
    }

    /// Grant the given roles to the user. Existing memberships are skipped;
    /// callers validate role existence beforehand, all-or-nothing.
    pub async fn add_to_roles(
        &self,
        user: &user::Model,
        roles: &[role::Model],
    ) -> Result<(), ServiceError> {
        if roles.is_empty() {
            return Ok(());
        }
        let memberships = roles.iter().map(|r| user_role::ActiveModel {
            user_id: Set(user.id.clone()),
            role_id: Set(r.id.clone()),
        });
        user_role::Entity::insert_many(memberships)
            .on_conflict(
                OnConflict::columns([user_role::Column::UserId, user_role::Column::RoleId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Create a role. A unique-violation on the name surfaces as
    /// `AlreadyExist`, which also closes the check-then-insert race.
    pub async fn create_role(&self, name: &str) -> Result<role::Model, ServiceError> {
        let model = role::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(name.to_string()),
        };
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::already_exist("Role already exists")
            } else {
                ServiceError::from(e)
            }
        })
    }

    pub async fn list_roles(&self) -> Result<Vec<String>, ServiceError> {
        let roles = role::Entity::find().all(self.db.as_ref()).await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }
}
