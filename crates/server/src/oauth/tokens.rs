//! JWT signing and validation.
//!
//! Tokens are signed with RS256 when a PEM key pair is configured, or HS256
//! from a shared development secret otherwise. The issuer URL is stamped
//! into every token and enforced on validation.

use crate::config::SigningConfig;
use crate::oauth::claims::{ClaimsIdentity, Destination};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to read signing key: {0}")]
    KeyIo(#[from] std::io::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("No signing key material configured")]
    MissingKeyMaterial,
    #[error("Identity has no subject claim")]
    MissingSubject,
}

/// Registered JWT claims plus the identity claims routed to this token.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A signed access token and, when the `openid` scope was granted, a signed
/// identity token.
#[derive(Debug)]
pub struct IssuedTokens {
    pub access_token: String,
    pub id_token: Option<String>,
    pub expires_in: i64,
}

pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    access_token_lifetime: i64,
}

impl TokenIssuer {
    /// Build an issuer from the signing configuration. A PEM key pair takes
    /// precedence over the development secret.
    pub fn from_config(
        signing: &SigningConfig,
        issuer_url: &str,
        access_token_lifetime: i64,
    ) -> Result<Self, TokenError> {
        let (algorithm, encoding, decoding) = match (
            &signing.private_key_pem,
            &signing.public_key_pem,
            &signing.dev_secret,
        ) {
            (Some(private_path), Some(public_path), _) => {
                let private_pem = std::fs::read(private_path)?;
                let public_pem = std::fs::read(public_path)?;
                (
                    Algorithm::RS256,
                    EncodingKey::from_rsa_pem(&private_pem)?,
                    DecodingKey::from_rsa_pem(&public_pem)?,
                )
            }
            (_, _, Some(secret)) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            _ => return Err(TokenError::MissingKeyMaterial),
        };

        Ok(Self {
            algorithm,
            encoding,
            decoding,
            issuer: issuer_url.to_string(),
            access_token_lifetime,
        })
    }

    /// Sign an access token (and an identity token when `openid` was
    /// granted) for the identity, with the client id as audience. Claims are
    /// routed per their destinations.
    pub fn issue(
        &self,
        identity: &ClaimsIdentity,
        client_id: &str,
    ) -> Result<IssuedTokens, TokenError> {
        let subject = identity.subject().ok_or(TokenError::MissingSubject)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let scope = if identity.scopes().is_empty() {
            None
        } else {
            Some(identity.scopes().join(" "))
        };

        let access_claims = JwtClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: client_id.to_string(),
            exp: now + self.access_token_lifetime,
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
            scope,
            extra: identity.claims_for(Destination::AccessToken),
        };
        let header = Header::new(self.algorithm);
        let access_token = jsonwebtoken::encode(&header, &access_claims, &self.encoding)?;

        let id_token = if identity.has_scope(super::SCOPE_OPENID) {
            let id_claims = JwtClaims {
                iss: self.issuer.clone(),
                sub: subject.to_string(),
                aud: client_id.to_string(),
                exp: now + self.access_token_lifetime,
                iat: now,
                jti: uuid::Uuid::new_v4().to_string(),
                scope: None,
                extra: identity.claims_for(Destination::IdentityToken),
            };
            Some(jsonwebtoken::encode(&header, &id_claims, &self.encoding)?)
        } else {
            None
        };

        Ok(IssuedTokens {
            access_token,
            id_token,
            expires_in: self.access_token_lifetime,
        })
    }

    /// Validate a signed token and return its claims. The audience is not
    /// validated here; resource endpoints only care about a trusted issuer
    /// and signature.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
