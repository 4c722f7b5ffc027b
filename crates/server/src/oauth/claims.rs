//! Claims identities and per-claim destination routing.
//!
//! Every claim on an identity is routed to one or both of the issued tokens.
//! The well-known identity claims (`name`, `email`, `role`) always land in
//! the access token and additionally in the identity token when the matching
//! scope was granted; any other claim lands in both tokens.

use serde_json::Value;
use std::collections::BTreeMap;

pub const CLAIM_SUBJECT: &str = "sub";
pub const CLAIM_NAME: &str = "name";
pub const CLAIM_EMAIL: &str = "email";
pub const CLAIM_ROLE: &str = "role";

/// Claims whose identity-token destination is gated on a granted scope.
const SCOPE_GATED: &[(&str, &str)] = &[
    (CLAIM_NAME, super::SCOPE_PROFILE),
    (CLAIM_EMAIL, super::SCOPE_EMAIL),
    (CLAIM_ROLE, super::SCOPE_ROLES),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AccessToken,
    IdentityToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub kind: String,
    pub value: String,
}

/// An authenticated principal plus the scopes granted to it.
#[derive(Debug, Clone, Default)]
pub struct ClaimsIdentity {
    claims: Vec<Claim>,
    scopes: Vec<String>,
}

impl ClaimsIdentity {
    /// Identity for an interactive user: subject, email, name and one role
    /// claim per membership.
    pub fn for_user(user_id: &str, email: &str, name: &str, roles: &[String]) -> Self {
        let mut identity = Self::default();
        identity.set_claim(CLAIM_SUBJECT, user_id);
        identity.set_claim(CLAIM_EMAIL, email);
        identity.set_claim(CLAIM_NAME, name);
        identity.set_claims(CLAIM_ROLE, roles);
        identity
    }

    /// Identity for a client application in the client-credentials flow.
    /// Carries no scopes, so no identity token is issued for it.
    pub fn for_application(client_id: &str, display_name: &str) -> Self {
        let mut identity = Self::default();
        identity.set_claim(CLAIM_SUBJECT, client_id);
        identity.set_claim(CLAIM_NAME, display_name);
        identity.set_claim("app-id", client_id);
        identity.set_claim("client-id", client_id);
        identity
    }

    /// Set a single-valued claim, replacing any existing values of the kind.
    pub fn set_claim(&mut self, kind: &str, value: &str) -> &mut Self {
        self.claims.retain(|c| c.kind != kind);
        self.claims.push(Claim {
            kind: kind.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Set a multi-valued claim, replacing any existing values of the kind.
    pub fn set_claims(&mut self, kind: &str, values: &[String]) -> &mut Self {
        self.claims.retain(|c| c.kind != kind);
        for value in values {
            self.claims.push(Claim {
                kind: kind.to_string(),
                value: value.clone(),
            });
        }
        self
    }

    pub fn set_scopes<I, S>(&mut self, scopes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.kind == CLAIM_SUBJECT)
            .map(|c| c.value.as_str())
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Destinations for a claim of the given kind under this identity's
    /// granted scopes.
    pub fn destinations(&self, kind: &str) -> Vec<Destination> {
        match SCOPE_GATED.iter().find(|(claim, _)| *claim == kind) {
            Some((_, scope)) => {
                let mut out = vec![Destination::AccessToken];
                if self.has_scope(scope) {
                    out.push(Destination::IdentityToken);
                }
                out
            }
            None => vec![Destination::AccessToken, Destination::IdentityToken],
        }
    }

    /// Claims routed to the given destination, grouped by kind. Multi-valued
    /// kinds become JSON arrays. The subject claim is excluded; it is always
    /// carried as the registered `sub` claim of both tokens.
    pub fn claims_for(&self, destination: Destination) -> BTreeMap<String, Value> {
        let mut grouped: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for claim in &self.claims {
            if claim.kind == CLAIM_SUBJECT {
                continue;
            }
            if self.destinations(&claim.kind).contains(&destination) {
                grouped
                    .entry(claim.kind.clone())
                    .or_default()
                    .push(claim.value.as_str());
            }
        }

        grouped
            .into_iter()
            .map(|(kind, values)| {
                let value = if kind == CLAIM_ROLE || values.len() > 1 {
                    Value::Array(values.into_iter().map(Value::from).collect())
                } else {
                    Value::from(values[0])
                };
                (kind, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_identity(scopes: &[&str]) -> ClaimsIdentity {
        let mut identity = ClaimsIdentity::for_user(
            "user-1",
            "alice@example.com",
            "Alice",
            &["admin".to_string(), "auditor".to_string()],
        );
        identity.set_scopes(scopes.iter().copied());
        identity
    }

    #[test]
    fn gated_claims_reach_identity_token_only_with_scope() {
        let identity = user_identity(&["openid", "email"]);

        assert_eq!(
            identity.destinations(CLAIM_EMAIL),
            vec![Destination::AccessToken, Destination::IdentityToken]
        );
        assert_eq!(identity.destinations(CLAIM_NAME), vec![Destination::AccessToken]);
        assert_eq!(identity.destinations(CLAIM_ROLE), vec![Destination::AccessToken]);
    }

    #[test]
    fn unknown_claims_go_to_both_tokens() {
        let identity = user_identity(&[]);
        assert_eq!(
            identity.destinations("app-id"),
            vec![Destination::AccessToken, Destination::IdentityToken]
        );
    }

    #[test]
    fn access_token_always_carries_identity_claims() {
        let identity = user_identity(&[]);
        let claims = identity.claims_for(Destination::AccessToken);

        assert_eq!(claims["email"], "alice@example.com");
        assert_eq!(claims["name"], "Alice");
        assert_eq!(claims["role"], serde_json::json!(["admin", "auditor"]));
        assert!(!claims.contains_key("sub"));
    }

    #[test]
    fn identity_token_claims_follow_granted_scopes() {
        let identity = user_identity(&["openid", "profile", "roles"]);
        let claims = identity.claims_for(Destination::IdentityToken);

        assert_eq!(claims["name"], "Alice");
        assert_eq!(claims["role"], serde_json::json!(["admin", "auditor"]));
        assert!(!claims.contains_key("email"));
    }

    #[test]
    fn set_claim_replaces_existing_values() {
        let mut identity = ClaimsIdentity::default();
        identity.set_claim(CLAIM_EMAIL, "old@example.com");
        identity.set_claim(CLAIM_EMAIL, "new@example.com");

        let claims = identity.claims_for(Destination::AccessToken);
        assert_eq!(claims["email"], "new@example.com");
    }

    #[test]
    fn application_identity_has_no_identity_token_scopes() {
        let identity = ClaimsIdentity::for_application("client-1", "My Service");

        assert_eq!(identity.subject(), Some("client-1"));
        assert!(!identity.has_scope("openid"));

        let claims = identity.claims_for(Destination::AccessToken);
        assert_eq!(claims["app-id"], "client-1");
        assert_eq!(claims["client-id"], "client-1");
        assert_eq!(claims["name"], "My Service");
    }
}
