//! Startup seeding of the default OAuth client application.
//!
//! Reconciles the configured seed client on every start: an existing row is
//! left untouched, a missing one is created. Restarts are therefore
//! idempotent and never duplicate the client.

use crate::config::ClientSeedConfig;
use crate::error::ServiceError;
use crate::store::ApplicationRegistry;
use crate::store::applications::ApplicationDescriptor;
use tracing::{info, instrument};

const SEED_GRANT_TYPES: &str = "password client_credentials refresh_token otp_code";
const SEED_SCOPES: &str = "openid email profile roles offline_access";

/// Find-or-create the configured default client application.
#[instrument(skip(registry, seed), fields(client_id = %seed.client_id))]
pub async fn seed_default_client(
    registry: &ApplicationRegistry,
    seed: &ClientSeedConfig,
) -> Result<(), ServiceError> {
    if registry.find_by_client_id(&seed.client_id).await?.is_some() {
        info!("Default client application already present");
        return Ok(());
    }

    registry
        .create(ApplicationDescriptor {
            client_id: seed.client_id.clone(),
            client_secret: seed.client_secret.clone(),
            display_name: seed.display_name.clone(),
            grant_types: SEED_GRANT_TYPES.to_string(),
            scopes: SEED_SCOPES.to_string(),
        })
        .await?;

    info!("Seeded default client application");
    Ok(())
}
