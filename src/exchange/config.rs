//! Token Exchange configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::token_type::TokenType;

/// Token Exchange configuration (RFC 8693).
///
/// A configuration is bound once per deployment or reload and shared behind an
/// `Arc`; exchanges only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfiguration {
    /// Token types accepted as `subject_token_type`. Refresh tokens and SAML
    /// assertions need a `TokenValidator` that understands them.
    #[serde(default = "default_subject_types")]
    pub allowed_subject_token_types: Vec<TokenType>,

    /// Token types accepted as `actor_token_type`.
    #[serde(default = "default_actor_types")]
    pub allowed_actor_token_types: Vec<TokenType>,

    /// Token types that may be requested via `requested_token_type`.
    #[serde(default = "default_requested_types")]
    pub allowed_requested_token_types: Vec<TokenType>,

    /// Allow a client to obtain a token for a subject other than itself
    /// without presenting an actor token.
    #[serde(default)]
    pub allow_impersonation: bool,

    /// Allow exchanges that carry an actor token.
    #[serde(default = "default_true")]
    pub allow_delegation: bool,

    /// Maximum number of nested `act` levels in an issued token.
    #[serde(default = "default_max_depth")]
    pub max_delegation_chain_depth: u32,

    /// Issuers accepted for subject and actor tokens. Empty accepts any issuer
    /// whose signature verifies.
    #[serde(default)]
    pub trusted_issuers: Vec<String>,

    /// Require cryptographic verification of subject and actor tokens.
    #[serde(default = "default_true")]
    pub validate_signature: bool,

    /// Reject requests without an `audience` parameter.
    #[serde(default)]
    pub require_audience: bool,

    /// How requested scopes are reconciled with the subject token's scopes.
    #[serde(default)]
    pub scope_policy: ScopePolicy,

    /// Ask the issuer for a refresh token alongside the exchanged token.
    #[serde(default)]
    pub issue_refresh_token: bool,

    /// Claims copied from the subject token into the issued token.
    #[serde(default)]
    pub claims_mapper: Vec<ClaimMapping>,

    /// Static verification key for externally issued tokens (PEM, or the
    /// shared secret for HMAC algorithms).
    #[serde(default)]
    pub public_key: Option<String>,

    /// JWKS endpoint used to resolve verification keys by `kid`.
    #[serde(default)]
    pub public_key_resolver: Option<String>,

    /// Upper bound on each token validation call, in milliseconds.
    #[serde(default = "default_resolver_timeout")]
    pub resolver_timeout_ms: u64,

    /// Lifetime of cached JWKS keys, in seconds.
    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl_secs: u64,

    /// Log request metadata for every exchange.
    #[serde(default)]
    pub log_exchanges: bool,
}

/// Scope reconciliation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopePolicy {
    /// Requested scopes must be a subset of the subject token's scopes.
    #[default]
    #[serde(alias = "REDUCE")]
    Reduce,
    /// Always issue the subject token's scopes.
    #[serde(alias = "PRESERVE")]
    Preserve,
    /// Issue the requested scopes verbatim.
    #[serde(alias = "CUSTOM")]
    Custom,
}

/// Copies `source_claim` of the subject token into `target_claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMapping {
    pub source_claim: String,
    pub target_claim: String,
}

impl ClaimMapping {
    pub fn new(source_claim: impl Into<String>, target_claim: impl Into<String>) -> Self {
        Self {
            source_claim: source_claim.into(),
            target_claim: target_claim.into(),
        }
    }
}

fn default_subject_types() -> Vec<TokenType> {
    vec![TokenType::AccessToken, TokenType::IdToken, TokenType::Jwt]
}

fn default_actor_types() -> Vec<TokenType> {
    vec![TokenType::AccessToken, TokenType::IdToken, TokenType::Jwt]
}

fn default_requested_types() -> Vec<TokenType> {
    vec![TokenType::AccessToken, TokenType::Jwt]
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    3
}

fn default_resolver_timeout() -> u64 {
    5000
}

fn default_key_cache_ttl() -> u64 {
    3600 // 1 hour
}

impl Default for ExchangeConfiguration {
    fn default() -> Self {
        Self {
            allowed_subject_token_types: default_subject_types(),
            allowed_actor_token_types: default_actor_types(),
            allowed_requested_token_types: default_requested_types(),
            allow_impersonation: false,
            allow_delegation: true,
            max_delegation_chain_depth: default_max_depth(),
            trusted_issuers: Vec::new(),
            validate_signature: true,
            require_audience: false,
            scope_policy: ScopePolicy::default(),
            issue_refresh_token: false,
            claims_mapper: Vec::new(),
            public_key: None,
            public_key_resolver: None,
            resolver_timeout_ms: default_resolver_timeout(),
            key_cache_ttl_secs: default_key_cache_ttl(),
            log_exchanges: false,
        }
    }
}

impl ExchangeConfiguration {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_subject_token_types.is_empty() {
            return Err("allowed_subject_token_types must not be empty".to_string());
        }

        if self.allowed_requested_token_types.is_empty() {
            return Err("allowed_requested_token_types must not be empty".to_string());
        }

        if self.allow_delegation && self.allowed_actor_token_types.is_empty() {
            return Err(
                "allowed_actor_token_types must not be empty when delegation is allowed"
                    .to_string(),
            );
        }

        if self.resolver_timeout_ms == 0 {
            return Err("resolver_timeout_ms must be greater than zero".to_string());
        }

        if let Some(ref url) = self.public_key_resolver {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err("public_key_resolver must be a valid HTTP(S) URL".to_string());
            }
        }

        Ok(())
    }

    /// Timeout applied to each token validation call.
    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    /// Whether `issuer` passes the trusted-issuer list.
    pub fn is_issuer_trusted(&self, issuer: &str) -> bool {
        self.trusted_issuers.is_empty() || self.trusted_issuers.iter().any(|i| i == issuer)
    }
}

/// JSON overlay used to derive a new configuration snapshot on reload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ExchangeConfigurationJson {
    pub allowed_subject_token_types: Option<Vec<TokenType>>,
    pub allowed_actor_token_types: Option<Vec<TokenType>>,
    pub allowed_requested_token_types: Option<Vec<TokenType>>,
    pub allow_impersonation: Option<bool>,
    pub allow_delegation: Option<bool>,
    pub max_delegation_chain_depth: Option<u32>,
    pub trusted_issuers: Option<Vec<String>>,
    pub validate_signature: Option<bool>,
    pub require_audience: Option<bool>,
    pub scope_policy: Option<ScopePolicy>,
    pub issue_refresh_token: Option<bool>,
    pub claims_mapper: Option<Vec<ClaimMapping>>,
    pub public_key: Option<String>,
    pub public_key_resolver: Option<String>,
    pub resolver_timeout_ms: Option<u64>,
    pub key_cache_ttl_secs: Option<u64>,
    pub log_exchanges: Option<bool>,
}

impl ExchangeConfigurationJson {
    /// Apply JSON config to a configuration that has not been shared yet.
    pub fn apply_to(&self, config: &mut ExchangeConfiguration) {
        if let Some(ref types) = self.allowed_subject_token_types {
            config.allowed_subject_token_types = types.clone();
        }
        if let Some(ref types) = self.allowed_actor_token_types {
            config.allowed_actor_token_types = types.clone();
        }
        if let Some(ref types) = self.allowed_requested_token_types {
            config.allowed_requested_token_types = types.clone();
        }
        if let Some(allow) = self.allow_impersonation {
            config.allow_impersonation = allow;
        }
        if let Some(allow) = self.allow_delegation {
            config.allow_delegation = allow;
        }
        if let Some(depth) = self.max_delegation_chain_depth {
            config.max_delegation_chain_depth = depth;
        }
        if let Some(ref issuers) = self.trusted_issuers {
            config.trusted_issuers = issuers.clone();
        }
        if let Some(validate) = self.validate_signature {
            config.validate_signature = validate;
        }
        if let Some(require) = self.require_audience {
            config.require_audience = require;
        }
        if let Some(policy) = self.scope_policy {
            config.scope_policy = policy;
        }
        if let Some(issue) = self.issue_refresh_token {
            config.issue_refresh_token = issue;
        }
        if let Some(ref mapper) = self.claims_mapper {
            config.claims_mapper = mapper.clone();
        }
        if let Some(ref key) = self.public_key {
            config.public_key = Some(key.clone());
        }
        if let Some(ref url) = self.public_key_resolver {
            config.public_key_resolver = Some(url.clone());
        }
        if let Some(timeout) = self.resolver_timeout_ms {
            config.resolver_timeout_ms = timeout;
        }
        if let Some(ttl) = self.key_cache_ttl_secs {
            config.key_cache_ttl_secs = ttl;
        }
        if let Some(log) = self.log_exchanges {
            config.log_exchanges = log;
        }
    }
}

/// Configuration of the default JWT token issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerConfig {
    /// Path to signing key (PEM format) for issued tokens.
    #[serde(default)]
    pub signing_key_path: Option<PathBuf>,

    /// Inline signing key (base64-encoded for symmetric, PEM for asymmetric).
    #[serde(default)]
    pub signing_key_inline: Option<String>,

    /// Signing algorithm (RS256, ES256, HS256).
    #[serde(default = "default_algorithm")]
    pub signing_algorithm: String,

    /// Issuer claim for issued tokens.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Audience used when the request names none.
    #[serde(default)]
    pub default_audience: Option<String>,

    /// Token TTL in seconds.
    #[serde(default = "default_ttl")]
    pub token_ttl_secs: u64,
}

fn default_algorithm() -> String {
    "RS256".to_string()
}

fn default_ttl() -> u64 {
    3600 // 1 hour
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            signing_key_path: None,
            signing_key_inline: None,
            signing_algorithm: default_algorithm(),
            issuer: None,
            default_audience: None,
            token_ttl_secs: default_ttl(),
        }
    }
}

impl IssuerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        // Must have a signing key
        if self.signing_key_path.is_none() && self.signing_key_inline.is_none() {
            return Err("Token issuer requires signing_key_path or signing_key_inline".to_string());
        }

        // If key path specified, check it exists
        if let Some(ref path) = self.signing_key_path {
            if !path.exists() {
                return Err(format!("Signing key file does not exist: {:?}", path));
            }
        }

        let valid_algs = ["RS256", "RS384", "RS512", "ES256", "ES384", "HS256", "HS384", "HS512"];
        if !valid_algs.contains(&self.signing_algorithm.as_str()) {
            return Err(format!(
                "Invalid signing algorithm: {}. Valid: {:?}",
                self.signing_algorithm, valid_algs
            ));
        }

        if self.issuer.is_none() {
            return Err("Token issuer requires issuer to be configured".to_string());
        }

        Ok(())
    }
}
