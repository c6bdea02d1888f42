//! JWT validation with static keys or JSON Web Key Sets (JWKS).
//!
//! Provides the default token validation collaborator used to resolve
//! subject and actor tokens, with a shared single-flight key cache.

pub mod jwks;
pub mod validator;

pub use jwks::{HttpKeySource, Jwk, Jwks, KeyCache, KeyCacheError, KeySource};
pub use validator::{JwtTokenValidator, DEFAULT_CLOCK_SKEW_SECS};
