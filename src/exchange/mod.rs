//! Token Exchange (RFC 8693).
//!
//! Trade a subject token, optionally presented together with an actor token,
//! for a newly issued token. Supports:
//! - Impersonation (subject only, no `act` claim)
//! - Delegation (`act` claim chains with a depth limit)
//! - Scope reduction, preservation or custom scopes
//! - Claim mapping from the subject token

pub mod claims;
pub mod config;
pub mod delegation;
pub mod handler;
pub mod issuer;
pub mod policy;
pub mod request;
pub mod resolver;
pub mod scope;
pub mod token_type;

pub use config::{
    ClaimMapping, ExchangeConfiguration, ExchangeConfigurationJson, IssuerConfig, ScopePolicy,
};
pub use delegation::ActClaim;
pub use handler::{ExchangeResult, TokenExchanger};
pub use issuer::{
    IssuanceError, IssuedToken, JwtTokenIssuer, TokenExchangeResponse, TokenIssuance,
};
pub use request::{parse, parse_form, ActorToken, ExchangeRequest, GRANT_TYPE_TOKEN_EXCHANGE};
pub use resolver::{ResolvedToken, TokenResolver, TokenValidator, TrustHints, ValidationError};
pub use scope::ScopeSet;
pub use token_type::TokenType;
