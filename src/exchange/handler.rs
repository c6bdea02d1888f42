//! Token exchange orchestration (RFC 8693).

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::claims::map_claims;
use super::config::ExchangeConfiguration;
use super::delegation::build_act_claim;
use super::issuer::{IssuedToken, TokenIssuance};
use super::policy::{check_impersonation, check_static_policy, check_trust_policy};
use super::request::{parse, ExchangeRequest};
use super::resolver::{ResolvedToken, TokenResolver};
use super::scope::{negotiate, ScopeSet};
use super::token_type::TokenType;
use crate::error::ExchangeError;

/// Outcome of a successful exchange, handed to the issuer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeResult {
    /// Type of token to issue.
    pub issued_token_type: TokenType,
    /// Identity the issued token speaks for.
    pub subject: String,
    /// Base claims, mapped claims and the optional `act` claim.
    pub claims: HashMap<String, Value>,
    /// Final scopes.
    pub scope: ScopeSet,
    /// Whether a refresh token should accompany the issued token.
    pub issue_refresh_token: bool,
}

impl ExchangeResult {
    /// The `act` claim of the issued token, if the exchange was a delegation.
    pub fn act(&self) -> Option<&Value> {
        self.claims.get("act")
    }
}

/// Runs token exchanges against one configuration snapshot.
#[derive(Clone)]
pub struct TokenExchanger {
    config: Arc<ExchangeConfiguration>,
    resolver: TokenResolver,
    issuer: Arc<dyn TokenIssuance>,
}

impl TokenExchanger {
    pub fn new(
        config: Arc<ExchangeConfiguration>,
        resolver: TokenResolver,
        issuer: Arc<dyn TokenIssuance>,
    ) -> Self {
        Self {
            config,
            resolver,
            issuer,
        }
    }

    pub fn config(&self) -> &ExchangeConfiguration {
        &self.config
    }

    /// Exchange the presented tokens and issue the new token.
    ///
    /// The issuer's output is returned unchanged. Dropping the returned future
    /// cancels any in-flight token resolution.
    pub async fn grant(
        &self,
        params: &HashMap<String, String>,
        client_id: &str,
    ) -> Result<IssuedToken, ExchangeError> {
        let result = self.evaluate(params, client_id).await?;

        self.issuer.issue(&result).await.map_err(|e| {
            warn!(error = %e, "Failed to issue token");
            ExchangeError::server("failed to issue token")
        })
    }

    /// Run the exchange pipeline without issuing a token.
    pub async fn evaluate(
        &self,
        params: &HashMap<String, String>,
        client_id: &str,
    ) -> Result<ExchangeResult, ExchangeError> {
        let result = self.run(params, client_id).await;
        if let Err(ref e) = result {
            warn!(client_id = %client_id, error = %e, "Token exchange rejected");
        }
        result
    }

    async fn run(
        &self,
        params: &HashMap<String, String>,
        client_id: &str,
    ) -> Result<ExchangeResult, ExchangeError> {
        let config = self.config.as_ref();

        let request = parse(params, client_id, config)?;

        if config.log_exchanges {
            debug!(
                client_id = %request.client_id,
                subject_token_type = %request.subject_token_type,
                requested_token_type = %request.requested_token_type,
                actor_token_type = ?request.actor.as_ref().map(|a| a.token_type.as_urn()),
                audience = ?request.audience,
                "Processing token exchange"
            );
        }

        check_static_policy(&request, config)?;

        let (subject, actor) = self.resolve_tokens(&request).await?;

        check_trust_policy(&subject, actor.as_ref(), config)?;
        check_impersonation(&request, &subject, config)?;

        let act = build_act_claim(&subject, actor.as_ref(), config)?;
        let scope = negotiate(&request.scope, &subject.scope, config.scope_policy)?;

        let mut claims = base_claims(&request, &subject);
        for (name, value) in map_claims(&subject.claims, &config.claims_mapper) {
            // Identity claims are owned by the exchange.
            if name != "sub" && name != "act" {
                claims.insert(name, value);
            }
        }
        if let Some(ref act) = act {
            claims.insert("act".to_string(), act.to_value());
        }

        info!(
            subject = %subject.subject,
            client_id = %request.client_id,
            from_type = %request.subject_token_type,
            to_type = %request.requested_token_type,
            delegated = act.is_some(),
            "Token exchange successful"
        );

        Ok(ExchangeResult {
            issued_token_type: request.requested_token_type,
            subject: subject.subject,
            claims,
            scope,
            issue_refresh_token: config.issue_refresh_token,
        })
    }

    /// Resolve subject and actor tokens concurrently; the first failure wins.
    async fn resolve_tokens(
        &self,
        request: &ExchangeRequest,
    ) -> Result<(ResolvedToken, Option<ResolvedToken>), ExchangeError> {
        let config = self.config.as_ref();
        let subject = self
            .resolver
            .resolve(&request.subject_token, request.subject_token_type, config);

        match request.actor {
            Some(ref actor) => {
                let actor = self.resolver.resolve(&actor.token, actor.token_type, config);
                let (subject, actor) = tokio::try_join!(subject, actor)?;
                Ok((subject, Some(actor)))
            }
            None => Ok((subject.await?, None)),
        }
    }
}

/// Claims every exchanged token carries.
fn base_claims(request: &ExchangeRequest, subject: &ResolvedToken) -> HashMap<String, Value> {
    let mut claims = HashMap::new();
    claims.insert("sub".to_string(), Value::String(subject.subject.clone()));
    claims.insert(
        "client_id".to_string(),
        Value::String(request.client_id.clone()),
    );

    let audiences: Vec<Value> = request
        .audience
        .iter()
        .chain(request.resource.iter())
        .map(|a| Value::String(a.clone()))
        .collect();
    match audiences.len() {
        0 => {}
        1 => {
            claims.insert("aud".to_string(), audiences[0].clone());
        }
        _ => {
            claims.insert("aud".to_string(), Value::Array(audiences));
        }
    }

    claims
}
