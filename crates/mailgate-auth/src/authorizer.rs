//! API key authorization for the calling gateway
//!
//! Produces an allow/deny policy document. Any failure along the way ends in
//! a deny decision; this never returns an error.

use crate::secrets::keys;
use crate::SecretStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

const POLICY_VERSION: &str = "2012-10-17";
const INVOKE_ACTION: &str = "execute-api:Invoke";
const PRINCIPAL_ID: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: String,
    pub effect: Effect,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// Access decision handed back to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicy {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
}

impl AuthPolicy {
    pub fn new(effect: Effect, resource: impl Into<String>) -> Self {
        Self {
            principal_id: PRINCIPAL_ID.to_string(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![PolicyStatement {
                    action: INVOKE_ACTION.to_string(),
                    effect,
                    resource: resource.into(),
                }],
            },
        }
    }

    pub fn effect(&self) -> Effect {
        self.policy_document
            .statement
            .first()
            .map(|s| s.effect)
            .unwrap_or(Effect::Deny)
    }

    pub fn is_allowed(&self) -> bool {
        self.effect() == Effect::Allow
    }
}

/// Compares presented API keys against the `apiKey` secret
pub struct ApiKeyAuthorizer {
    secrets: Arc<SecretStore>,
}

impl ApiKeyAuthorizer {
    pub fn new(secrets: Arc<SecretStore>) -> Self {
        Self { secrets }
    }

    /// Decide whether `token` may invoke `resource`.
    ///
    /// `token` may be the bare key or `Bearer <key>`.
    pub async fn authorize(&self, token: Option<&str>, resource: &str) -> AuthPolicy {
        let presented = match token.map(strip_bearer).filter(|t| !t.is_empty()) {
            Some(t) => t,
            None => {
                debug!("No API key presented for {}", resource);
                return AuthPolicy::new(Effect::Deny, resource);
            }
        };

        let secrets = match self.secrets.get_secrets().await {
            Ok(secrets) => secrets,
            Err(e) => {
                error!("Error in auth: {}", e);
                return AuthPolicy::new(Effect::Deny, resource);
            }
        };

        let effect = match secrets.require(keys::API_KEY) {
            Ok(stored) if stored == presented => Effect::Allow,
            Ok(_) => Effect::Deny,
            Err(e) => {
                error!("Error in auth: {}", e);
                Effect::Deny
            }
        };

        debug!("Authorization for {}: {:?}", resource, effect);
        AuthPolicy::new(effect, resource)
    }
}

fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => token,
    }
}
