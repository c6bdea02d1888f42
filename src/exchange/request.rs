//! Exchange request parsing and validation.

use std::collections::HashMap;

use super::config::ExchangeConfiguration;
use super::scope::{parse_scope, ScopeSet};
use super::token_type::{is_allowed, TokenType};
use crate::error::ExchangeError;

/// Token exchange grant type (RFC 8693).
pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Validated token exchange request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    /// The subject token to exchange.
    pub subject_token: String,
    /// Type of the subject token.
    pub subject_token_type: TokenType,
    /// Actor token and its type (for delegation).
    pub actor: Option<ActorToken>,
    /// Requested token type (defaults to access_token).
    pub requested_token_type: TokenType,
    /// Target audience for the new token.
    pub audience: Option<String>,
    /// Requested scopes.
    pub scope: ScopeSet,
    /// Target resource.
    pub resource: Option<String>,
    /// Authenticated client making the request.
    pub client_id: String,
}

/// Actor token presented with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorToken {
    pub token: String,
    pub token_type: TokenType,
}

/// Parse and validate raw exchange parameters.
///
/// Checks run in a fixed order and the first failure wins. Blank values are
/// treated as absent; other values, token text included, are kept verbatim.
pub fn parse(
    params: &HashMap<String, String>,
    client_id: &str,
    config: &ExchangeConfiguration,
) -> Result<ExchangeRequest, ExchangeError> {
    let param = |name: &str| {
        params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    };

    if let Some(grant_type) = param("grant_type") {
        if grant_type != GRANT_TYPE_TOKEN_EXCHANGE {
            return Err(ExchangeError::invalid_request("unsupported grant_type"));
        }
    }

    let subject_token =
        param("subject_token").ok_or_else(|| ExchangeError::invalid_request("missing subject_token"))?;

    let subject_token_type = param("subject_token_type")
        .ok_or_else(|| ExchangeError::invalid_request("missing subject_token_type"))?;
    let subject_token_type = allowed_type(
        subject_token_type,
        &config.allowed_subject_token_types,
        "unsupported subject_token_type",
    )?;

    let actor = match param("actor_token") {
        Some(actor_token) => {
            let actor_token_type = param("actor_token_type")
                .ok_or_else(|| ExchangeError::invalid_request("missing actor_token_type"))?;
            let token_type = allowed_type(
                actor_token_type,
                &config.allowed_actor_token_types,
                "unsupported actor_token_type",
            )?;
            Some(ActorToken {
                token: actor_token.to_string(),
                token_type,
            })
        }
        None => None,
    };

    let requested_token_type = match param("requested_token_type") {
        Some(urn) => allowed_type(
            urn,
            &config.allowed_requested_token_types,
            "unsupported requested_token_type",
        )?,
        None if is_allowed(&config.allowed_requested_token_types, TokenType::AccessToken) => {
            TokenType::AccessToken
        }
        None => {
            return Err(ExchangeError::unsupported_token_type(
                "unsupported requested_token_type",
            ))
        }
    };

    let audience = param("audience").map(String::from);
    if config.require_audience && audience.is_none() {
        return Err(ExchangeError::invalid_request("missing audience"));
    }

    Ok(ExchangeRequest {
        subject_token: subject_token.to_string(),
        subject_token_type,
        actor,
        requested_token_type,
        audience,
        scope: param("scope").map(parse_scope).unwrap_or_default(),
        resource: param("resource").map(String::from),
        client_id: client_id.to_string(),
    })
}

fn allowed_type(
    urn: &str,
    allowed: &[TokenType],
    reason: &str,
) -> Result<TokenType, ExchangeError> {
    TokenType::from_urn(urn)
        .filter(|t| is_allowed(allowed, *t))
        .ok_or_else(|| ExchangeError::unsupported_token_type(reason))
}

/// Decode a form-urlencoded request body into raw parameters.
pub fn parse_form(body: &str) -> Result<HashMap<String, String>, ExchangeError> {
    serde_urlencoded::from_str(body)
        .map_err(|_| ExchangeError::invalid_request("invalid request body"))
}
