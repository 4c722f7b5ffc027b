use identity_server::AppResources;
use identity_server::account::AccountService;
use identity_server::api::start_webserver;
use identity_server::config::load_config_or_panic;
use identity_server::email::Mailer;
use identity_server::oauth::state::OAuthState;
use identity_server::oauth::tokens::TokenIssuer;
use identity_server::seed::seed_default_client;
use identity_server::store::{ApplicationRegistry, UserStore};
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "identity_server=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");

    initialize_tracing();

    // Load config
    let config = Arc::new(load_config_or_panic());

    // Set up SeaORM database connection
    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    // Set up lettre SMTP client (logging-only hook when not configured)
    let mailer = Mailer::new(config.smtp.as_ref(), &config.frontend_url)
        .expect("Failed to build SMTP transport");

    let issuer = Arc::new(
        TokenIssuer::from_config(
            &config.signing,
            &config.issuer_url,
            config.tokens.access_token_lifetime_secs,
        )
        .expect("Failed to load signing key material"),
    );

    let users = UserStore::new(db.clone(), config.tokens.clone());
    let applications = ApplicationRegistry::new(db.clone());

    seed_default_client(&applications, &config.client_seed)
        .await
        .expect("Failed to seed default client application");

    let account_service = AccountService::new(users.clone(), mailer.clone());
    let oauth_state = OAuthState {
        db: db.clone(),
        users,
        applications,
        issuer: issuer.clone(),
        mailer,
        tokens: config.tokens.clone(),
    };
    let resources = AppResources {
        db,
        config,
        issuer,
    };

    start_webserver(account_service, oauth_state, resources).await?;
    Ok(())
}
