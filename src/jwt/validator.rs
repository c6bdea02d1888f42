//! JWT validation collaborator for subject and actor tokens.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::jwks::{KeyCache, KeyCacheError};
use crate::exchange::issuer::symmetric_key_bytes;
use crate::exchange::resolver::{ResolvedToken, TokenValidator, TrustHints, ValidationError};
use crate::exchange::scope::{parse_scope, ScopeSet};
use crate::exchange::token_type::TokenType;

/// Default clock skew tolerance for `exp`/`nbf`, in seconds.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 30;

/// Validates JWT-format tokens with a static key or keys from a JWKS.
pub struct JwtTokenValidator {
    key_cache: Arc<KeyCache>,
    clock_skew_secs: u64,
}

impl JwtTokenValidator {
    pub fn new(key_cache: Arc<KeyCache>) -> Self {
        Self {
            key_cache,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }

    pub fn with_clock_skew(mut self, secs: u64) -> Self {
        self.clock_skew_secs = secs;
        self
    }

    async fn verification_key(
        &self,
        header: &Header,
        hints: &TrustHints,
    ) -> Result<DecodingKey, ValidationError> {
        if let Some(ref key) = hints.public_key {
            return static_key(key, header.alg);
        }

        let Some(ref url) = hints.public_key_resolver else {
            return Err(ValidationError::Rejected(
                "no verification key configured".to_string(),
            ));
        };

        self.key_cache
            .get_key(url, header.kid.as_deref())
            .await
            .map_err(|e| match e {
                KeyCacheError::KeyNotFound(_) => ValidationError::Rejected(e.to_string()),
                KeyCacheError::Fetch(_) | KeyCacheError::NoUsableKeys => {
                    ValidationError::Unavailable(e.to_string())
                }
            })
    }
}

#[async_trait]
impl TokenValidator for JwtTokenValidator {
    async fn validate(
        &self,
        token: &str,
        token_type: TokenType,
        hints: &TrustHints,
    ) -> Result<ResolvedToken, ValidationError> {
        if !token_type.is_jwt_format() {
            return Err(ValidationError::Rejected(format!(
                "{} tokens cannot be validated as JWT",
                token_type
            )));
        }

        let header = decode_header(token)
            .map_err(|_| ValidationError::Rejected("malformed token".to_string()))?;

        debug!(kid = ?header.kid, alg = ?header.alg, token_type = %token_type, "Validating token");

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.clock_skew_secs;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let key = if hints.validate_signature {
            self.verification_key(&header, hints).await?
        } else {
            validation.insecure_disable_signature_validation();
            DecodingKey::from_secret(&[])
        };

        let claims = decode::<HashMap<String, Value>>(token, &key, &validation)
            .map_err(|e| ValidationError::Rejected(format!("token validation failed: {}", e)))?
            .claims;

        let issuer = string_claim(&claims, "iss")?;
        let subject = string_claim(&claims, "sub")?;
        let scope = extract_scopes(&claims);

        Ok(ResolvedToken {
            claims,
            issuer,
            subject,
            scope,
            token_type,
            signature_verified: hints.validate_signature,
        })
    }
}

/// Build a decoding key from configured key material.
///
/// The token header picks the algorithm, so the configured key decides which
/// family is acceptable: PEM keys verify only asymmetric algorithms, shared
/// secrets only HMAC.
fn static_key(key: &str, alg: Algorithm) -> Result<DecodingKey, ValidationError> {
    let key = key.trim();
    if is_pem(key) == is_hmac(alg) {
        return Err(ValidationError::Rejected(format!(
            "algorithm {:?} not allowed for the configured key",
            alg
        )));
    }

    let result = match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Ok(DecodingKey::from_secret(&symmetric_key_bytes(key)))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(key.as_bytes()),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key.as_bytes()),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(key.as_bytes()),
    };
    result.map_err(|_| {
        ValidationError::Rejected(format!("configured key does not match algorithm {:?}", alg))
    })
}

fn is_pem(key: &str) -> bool {
    key.starts_with("-----BEGIN")
}

fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn string_claim(claims: &HashMap<String, Value>, name: &str) -> Result<String, ValidationError> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| ValidationError::Rejected(format!("missing {} claim", name)))
}

/// Extract scopes from `scope` (space-separated string or array) or `scp`.
fn extract_scopes(claims: &HashMap<String, Value>) -> ScopeSet {
    let value = claims.get("scope").or_else(|| claims.get("scp"));
    match value {
        Some(Value::String(s)) => parse_scope(s),
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => ScopeSet::new(),
    }
}
