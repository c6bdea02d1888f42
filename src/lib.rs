//! Zentinel Token Exchange
//!
//! The token-exchange engine of an OAuth 2.0 authorization server
//! (RFC 8693). A caller trades a subject token, optionally together with an
//! actor token, for a newly issued token. Requests are validated and checked
//! against the exchange policy before any token is resolved, and the issued
//! token records delegation chains in its `act` claim.

pub mod error;
pub mod exchange;
pub mod grant;
pub mod jwt;

pub use error::{ExchangeError, TokenExchangeError, Violation};
pub use exchange::{
    ExchangeConfiguration, ExchangeResult, IssuedToken, TokenExchanger, TokenType,
};
pub use grant::{ExtensionGrant, GrantDependencies, GrantRegistry};
