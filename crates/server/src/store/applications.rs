//! Application registry - OAuth client applications keyed by client id.

use crate::entity::application;
use crate::error::ServiceError;
use crate::store::credentials::hash_password;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use time::OffsetDateTime;

/// Descriptor for creating a client application. The secret is supplied in
/// plaintext and stored as an Argon2 hash.
#[derive(Debug, Clone)]
pub struct ApplicationDescriptor {
    pub client_id: String,
    pub client_secret: String,
    pub display_name: String,
    pub grant_types: String,
    pub scopes: String,
}

#[derive(Clone)]
pub struct ApplicationRegistry {
    db: Arc<DatabaseConnection>,
}

impl ApplicationRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<application::Model>, ServiceError> {
        Ok(application::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn create(
        &self,
        descriptor: ApplicationDescriptor,
    ) -> Result<application::Model, ServiceError> {
        let model = application::ActiveModel {
            client_id: Set(descriptor.client_id),
            client_secret_hash: Set(hash_password(&descriptor.client_secret)?),
            display_name: Set(descriptor.display_name),
            grant_types: Set(descriptor.grant_types),
            scopes: Set(descriptor.scopes),
            created_at: Set(OffsetDateTime::now_utc()),
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }
}
