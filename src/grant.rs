//! Extension grant registration.
//!
//! Grant types are registered explicitly at startup: each identifier maps to a
//! factory that builds the grant from a bound configuration.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::ExchangeError;
use crate::exchange::{
    ExchangeConfiguration, IssuedToken, TokenExchanger, TokenIssuance, TokenResolver,
    TokenValidator, GRANT_TYPE_TOKEN_EXCHANGE,
};

/// Collaborators shared by every grant built from a registry.
#[derive(Clone)]
pub struct GrantDependencies {
    pub validator: Arc<dyn TokenValidator>,
    pub issuer: Arc<dyn TokenIssuance>,
}

/// An OAuth 2.0 extension grant.
#[async_trait]
pub trait ExtensionGrant: Send + Sync {
    /// Grant type identifier (`grant_type` parameter value).
    fn grant_type(&self) -> &'static str;

    /// Handle a token request for this grant type.
    async fn grant(
        &self,
        params: &HashMap<String, String>,
        client_id: &str,
    ) -> Result<IssuedToken, ExchangeError>;
}

#[async_trait]
impl ExtensionGrant for TokenExchanger {
    fn grant_type(&self) -> &'static str {
        GRANT_TYPE_TOKEN_EXCHANGE
    }

    async fn grant(
        &self,
        params: &HashMap<String, String>,
        client_id: &str,
    ) -> Result<IssuedToken, ExchangeError> {
        TokenExchanger::grant(self, params, client_id).await
    }
}

/// Builds a grant from its bound configuration.
pub type GrantFactory =
    fn(ExchangeConfiguration, GrantDependencies) -> Result<Arc<dyn ExtensionGrant>>;

/// Grant type identifier -> factory.
#[derive(Default)]
pub struct GrantRegistry {
    factories: HashMap<&'static str, GrantFactory>,
}

impl GrantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in grants.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(GRANT_TYPE_TOKEN_EXCHANGE, token_exchange_grant);
        registry
    }

    pub fn register(&mut self, grant_type: &'static str, factory: GrantFactory) {
        self.factories.insert(grant_type, factory);
    }

    pub fn is_registered(&self, grant_type: &str) -> bool {
        self.factories.contains_key(grant_type)
    }

    /// Build the grant registered for `grant_type`, if any.
    pub fn build(
        &self,
        grant_type: &str,
        config: ExchangeConfiguration,
        deps: GrantDependencies,
    ) -> Result<Option<Arc<dyn ExtensionGrant>>> {
        let Some(factory) = self.factories.get(grant_type) else {
            return Ok(None);
        };
        let grant = factory(config, deps)?;
        info!(grant_type = %grant_type, "Extension grant initialized");
        Ok(Some(grant))
    }
}

fn token_exchange_grant(
    config: ExchangeConfiguration,
    deps: GrantDependencies,
) -> Result<Arc<dyn ExtensionGrant>> {
    config
        .validate()
        .map_err(|e| anyhow!("Invalid token exchange configuration: {}", e))?;

    Ok(Arc::new(TokenExchanger::new(
        Arc::new(config),
        TokenResolver::new(deps.validator),
        deps.issuer,
    )))
}
