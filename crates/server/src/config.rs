use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Seed credentials for the default OAuth client application, reconciled
/// (find-or-create) once at process start.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientSeedConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_client_display_name")]
    pub display_name: String,
}

/// Token signing key material. Either a PEM key pair (RS256) or, for
/// development and tests, a shared secret (HS256).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SigningConfig {
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    pub dev_secret: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime_secs: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime_secs: i64,
    #[serde(default = "default_otp_lifetime")]
    pub otp_lifetime_secs: i64,
    #[serde(default = "default_reset_token_lifetime")]
    pub reset_token_lifetime_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime_secs: default_access_token_lifetime(),
            refresh_token_lifetime_secs: default_refresh_token_lifetime(),
            otp_lifetime_secs: default_otp_lifetime(),
            reset_token_lifetime_secs: default_reset_token_lifetime(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Issuer URL stamped into every signed token (`iss` claim).
    pub issuer_url: String,
    /// Base URL used in password-reset links sent by email.
    pub frontend_url: String,
    /// SMTP transport for reset emails. When absent, delivery is a no-op
    /// hook that only logs, mirroring the OTP/SMS side.
    pub smtp: Option<SmtpConfig>,
    pub client_seed: ClientSeedConfig,
    pub signing: SigningConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
}

fn default_client_display_name() -> String {
    "Default client".to_string()
}

fn default_access_token_lifetime() -> i64 {
    3600 // 1 hour
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 7 // 7 days
}

fn default_otp_lifetime() -> i64 {
    300 // 5 minutes
}

fn default_reset_token_lifetime() -> i64 {
    86400 // 24 hours
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer_url.is_empty() {
            return Err(ConfigError::Validation("issuer_url must be set".into()));
        }
        if self.client_seed.client_id.is_empty() || self.client_seed.client_secret.is_empty() {
            return Err(ConfigError::Validation(
                "client_seed.client_id and client_seed.client_secret must be set".into(),
            ));
        }
        match (&self.signing.private_key_pem, &self.signing.dev_secret) {
            (Some(_), _) if self.signing.public_key_pem.is_none() => {
                return Err(ConfigError::Validation(
                    "signing.public_key_pem must accompany signing.private_key_pem".into(),
                ));
            }
            (None, Some(secret)) if secret.len() < 32 => {
                return Err(ConfigError::Validation(
                    "signing.dev_secret must be at least 32 characters".into(),
                ));
            }
            (None, None) => {
                return Err(ConfigError::Validation(
                    "either signing.private_key_pem or signing.dev_secret must be set".into(),
                ));
            }
            _ => {}
        }
        if let Some(smtp) = &self.smtp
            && smtp.port == 0
        {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `SIGNING__DEV_SECRET`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
