//! Exchange error taxonomy and its OAuth 2.0 wire form.
//!
//! Every variant carries a coarse, non-sensitive reason. Token contents and
//! collaborator details never reach the description sent to clients.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a token exchange. The first failure aborts the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// A required parameter is missing or malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A token type is unknown or not in its configured allow-list.
    #[error("unsupported token type: {0}")]
    UnsupportedTokenType(String),

    /// The request is well formed but the exchange policy forbids it.
    #[error("policy violation: {0}")]
    PolicyViolation(Violation),

    /// The subject or actor token could not be verified.
    #[error("token validation failed: {0}")]
    TokenValidation(String),

    /// A collaborator timed out or failed unexpectedly.
    #[error("server error: {0}")]
    Server(String),
}

/// Reason for a [`ExchangeError::PolicyViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    DelegationNotAllowed,
    ImpersonationNotAllowed,
    ChainTooDeep,
    ScopeEscalation,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Violation::DelegationNotAllowed => "delegation not allowed",
            Violation::ImpersonationNotAllowed => "impersonation not allowed",
            Violation::ChainTooDeep => "delegation chain too deep",
            Violation::ScopeEscalation => "scope escalation",
        };
        f.write_str(reason)
    }
}

impl ExchangeError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    pub fn unsupported_token_type(reason: impl Into<String>) -> Self {
        Self::UnsupportedTokenType(reason.into())
    }

    pub fn token_validation(reason: impl Into<String>) -> Self {
        Self::TokenValidation(reason.into())
    }

    pub fn server(reason: impl Into<String>) -> Self {
        Self::Server(reason.into())
    }

    /// OAuth 2.0 `error` code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::InvalidRequest(_) => "invalid_request",
            ExchangeError::UnsupportedTokenType(_) => "unsupported_token_type",
            ExchangeError::PolicyViolation(Violation::ScopeEscalation) => "invalid_scope",
            ExchangeError::PolicyViolation(_) | ExchangeError::TokenValidation(_) => {
                "invalid_grant"
            }
            ExchangeError::Server(_) => "server_error",
        }
    }

    /// HTTP status the endpoint layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ExchangeError::Server(_) => 500,
            _ => 400,
        }
    }

    /// Coarse description safe to return to the client.
    pub fn description(&self) -> String {
        match self {
            ExchangeError::InvalidRequest(reason)
            | ExchangeError::UnsupportedTokenType(reason) => reason.clone(),
            ExchangeError::PolicyViolation(violation) => violation.to_string(),
            // Validation details can describe the token; keep them server-side.
            ExchangeError::TokenValidation(_) => "invalid subject or actor token".to_string(),
            ExchangeError::Server(_) => "temporarily unable to process the exchange".to_string(),
        }
    }
}

impl From<Violation> for ExchangeError {
    fn from(violation: Violation) -> Self {
        ExchangeError::PolicyViolation(violation)
    }
}

/// Token exchange error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenExchangeError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&ExchangeError> for TokenExchangeError {
    fn from(err: &ExchangeError) -> Self {
        Self {
            error: err.error_code().to_string(),
            error_description: Some(err.description()),
        }
    }
}
