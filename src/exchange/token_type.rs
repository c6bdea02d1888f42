//! Token type registry (RFC 8693 section 3).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token type URNs recognised by the exchange engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    /// OAuth 2.0 access token.
    #[serde(rename = "urn:ietf:params:oauth:token-type:access_token")]
    AccessToken,
    /// OAuth 2.0 refresh token.
    #[serde(rename = "urn:ietf:params:oauth:token-type:refresh_token")]
    RefreshToken,
    /// OpenID Connect ID token.
    #[serde(rename = "urn:ietf:params:oauth:token-type:id_token")]
    IdToken,
    /// Generic JWT.
    #[serde(rename = "urn:ietf:params:oauth:token-type:jwt")]
    Jwt,
    /// SAML 1.1 assertion.
    #[serde(rename = "urn:ietf:params:oauth:token-type:saml1")]
    Saml1,
    /// SAML 2.0 assertion.
    #[serde(rename = "urn:ietf:params:oauth:token-type:saml2")]
    Saml2,
}

impl TokenType {
    /// Every registered token type.
    pub const ALL: [TokenType; 6] = [
        TokenType::AccessToken,
        TokenType::RefreshToken,
        TokenType::IdToken,
        TokenType::Jwt,
        TokenType::Saml1,
        TokenType::Saml2,
    ];

    /// Get the URN for this token type.
    pub fn as_urn(&self) -> &'static str {
        match self {
            TokenType::AccessToken => "urn:ietf:params:oauth:token-type:access_token",
            TokenType::RefreshToken => "urn:ietf:params:oauth:token-type:refresh_token",
            TokenType::IdToken => "urn:ietf:params:oauth:token-type:id_token",
            TokenType::Jwt => "urn:ietf:params:oauth:token-type:jwt",
            TokenType::Saml1 => "urn:ietf:params:oauth:token-type:saml1",
            TokenType::Saml2 => "urn:ietf:params:oauth:token-type:saml2",
        }
    }

    /// Parse from URN string.
    pub fn from_urn(urn: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_urn() == urn)
    }

    /// Whether tokens of this type are JWTs that can be decoded locally.
    pub fn is_jwt_format(&self) -> bool {
        matches!(
            self,
            TokenType::AccessToken | TokenType::IdToken | TokenType::Jwt
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_urn())
    }
}

impl FromStr for TokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_urn(s).ok_or_else(|| format!("unknown token type: {}", s))
    }
}

/// Check membership of a token type in a configured allow-list.
pub fn is_allowed(allowed: &[TokenType], token_type: TokenType) -> bool {
    allowed.contains(&token_type)
}
