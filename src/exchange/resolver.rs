//! Token resolution through the external validation collaborator.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::config::ExchangeConfiguration;
use super::scope::ScopeSet;
use super::token_type::TokenType;
use crate::error::ExchangeError;

/// Verified contents of a subject or actor token.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedToken {
    /// All claims of the token.
    pub claims: HashMap<String, Value>,
    /// Issuer (`iss`).
    pub issuer: String,
    /// Subject (`sub`).
    pub subject: String,
    /// Scopes granted to the token.
    pub scope: ScopeSet,
    /// Type the token was presented as.
    pub token_type: TokenType,
    /// Whether the collaborator verified the token's signature.
    pub signature_verified: bool,
}

/// Trust material handed to the validation collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustHints {
    /// Issuers the exchange accepts. Empty accepts any.
    pub trusted_issuers: Vec<String>,
    /// Whether the signature must be verified.
    pub validate_signature: bool,
    /// Static verification key for external issuers.
    pub public_key: Option<String>,
    /// JWKS endpoint for external issuers.
    pub public_key_resolver: Option<String>,
}

impl From<&ExchangeConfiguration> for TrustHints {
    fn from(config: &ExchangeConfiguration) -> Self {
        Self {
            trusted_issuers: config.trusted_issuers.clone(),
            validate_signature: config.validate_signature,
            public_key: config.public_key.clone(),
            public_key_resolver: config.public_key_resolver.clone(),
        }
    }
}

/// Failure reported by a [`TokenValidator`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The token is expired, malformed, badly signed or otherwise unacceptable.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// Validation could not complete (key fetch failure, transport error).
    #[error("validation unavailable: {0}")]
    Unavailable(String),
}

/// Token validation collaborator: verifies signature and expiry, decodes claims.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(
        &self,
        token: &str,
        token_type: TokenType,
        hints: &TrustHints,
    ) -> Result<ResolvedToken, ValidationError>;
}

/// Resolves token strings into verified claim sets with a bounded timeout.
#[derive(Clone)]
pub struct TokenResolver {
    validator: Arc<dyn TokenValidator>,
}

impl TokenResolver {
    pub fn new(validator: Arc<dyn TokenValidator>) -> Self {
        Self { validator }
    }

    /// Resolve one token.
    pub async fn resolve(
        &self,
        token: &str,
        token_type: TokenType,
        config: &ExchangeConfiguration,
    ) -> Result<ResolvedToken, ExchangeError> {
        let hints = TrustHints::from(config);
        let timeout: Duration = config.resolver_timeout();

        let validation = self.validator.validate(token, token_type, &hints);
        let outcome = tokio::time::timeout(timeout, validation)
            .await
            .map_err(|_| {
                warn!(
                    token_type = %token_type,
                    timeout_ms = timeout.as_millis() as u64,
                    "Token validation timed out"
                );
                ExchangeError::server("token validation timed out")
            })?;

        match outcome {
            Ok(resolved) => {
                debug!(
                    token_type = %token_type,
                    issuer = %resolved.issuer,
                    subject = %resolved.subject,
                    signature_verified = resolved.signature_verified,
                    "Token resolved"
                );
                Ok(resolved)
            }
            Err(ValidationError::Rejected(reason)) => {
                warn!(token_type = %token_type, error = %reason, "Token rejected");
                Err(ExchangeError::token_validation(reason))
            }
            Err(ValidationError::Unavailable(reason)) => {
                warn!(token_type = %token_type, error = %reason, "Token validation unavailable");
                Err(ExchangeError::server(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedValidator(Result<ResolvedToken, ValidationError>);

    #[async_trait]
    impl TokenValidator for FixedValidator {
        async fn validate(
            &self,
            _token: &str,
            _token_type: TokenType,
            _hints: &TrustHints,
        ) -> Result<ResolvedToken, ValidationError> {
            self.0.clone()
        }
    }

    struct SlowValidator;

    #[async_trait]
    impl TokenValidator for SlowValidator {
        async fn validate(
            &self,
            _token: &str,
            _token_type: TokenType,
            _hints: &TrustHints,
        ) -> Result<ResolvedToken, ValidationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(ValidationError::Unavailable("unreachable".to_string()))
        }
    }

    fn resolved() -> ResolvedToken {
        ResolvedToken {
            claims: HashMap::new(),
            issuer: "https://idp.example.com".to_string(),
            subject: "user123".to_string(),
            scope: ScopeSet::new(),
            token_type: TokenType::AccessToken,
            signature_verified: true,
        }
    }

    #[tokio::test]
    async fn test_resolve_success() {
        let resolver = TokenResolver::new(Arc::new(FixedValidator(Ok(resolved()))));
        let config = ExchangeConfiguration::default();

        let token = resolver
            .resolve("token", TokenType::AccessToken, &config)
            .await
            .unwrap();
        assert_eq!(token.subject, "user123");
    }

    #[tokio::test]
    async fn test_rejection_maps_to_token_validation() {
        let resolver = TokenResolver::new(Arc::new(FixedValidator(Err(
            ValidationError::Rejected("expired".to_string()),
        ))));
        let config = ExchangeConfiguration::default();

        let err = resolver
            .resolve("token", TokenType::AccessToken, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::TokenValidation(_)));
    }

    #[tokio::test]
    async fn test_unavailable_maps_to_server_error() {
        let resolver = TokenResolver::new(Arc::new(FixedValidator(Err(
            ValidationError::Unavailable("jwks fetch failed".to_string()),
        ))));
        let config = ExchangeConfiguration::default();

        let err = resolver
            .resolve("token", TokenType::AccessToken, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Server(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_server_error() {
        let resolver = TokenResolver::new(Arc::new(SlowValidator));
        let config = ExchangeConfiguration {
            resolver_timeout_ms: 50,
            ..Default::default()
        };

        let err = resolver
            .resolve("token", TokenType::AccessToken, &config)
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::server("token validation timed out"));
    }

    #[test]
    fn test_trust_hints_from_config() {
        let config = ExchangeConfiguration {
            trusted_issuers: vec!["https://idp.example.com".to_string()],
            public_key_resolver: Some("https://idp.example.com/jwks".to_string()),
            ..Default::default()
        };
        let hints = TrustHints::from(&config);
        assert!(hints.validate_signature);
        assert_eq!(hints.trusted_issuers, config.trusted_issuers);
        assert_eq!(hints.public_key_resolver, config.public_key_resolver);
    }
}
