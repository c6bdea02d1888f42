//! Exchange policy: delegation, impersonation and issuer trust rules.

use tracing::warn;

use super::config::ExchangeConfiguration;
use super::request::ExchangeRequest;
use super::resolver::ResolvedToken;
use crate::error::{ExchangeError, Violation};

/// Rules that need only the parsed request. Runs before any token is resolved.
pub fn check_static_policy(
    request: &ExchangeRequest,
    config: &ExchangeConfiguration,
) -> Result<(), ExchangeError> {
    if request.actor.is_some() && !config.allow_delegation {
        return Err(Violation::DelegationNotAllowed.into());
    }
    Ok(())
}

/// Impersonation rule, evaluated once the subject's identity is known.
///
/// Without an actor token the issued token carries the subject's identity
/// alone. When that subject is not the authenticated client itself, the
/// client is impersonating it.
pub fn check_impersonation(
    request: &ExchangeRequest,
    subject: &ResolvedToken,
    config: &ExchangeConfiguration,
) -> Result<(), ExchangeError> {
    if request.actor.is_none()
        && subject.subject != request.client_id
        && !config.allow_impersonation
    {
        return Err(Violation::ImpersonationNotAllowed.into());
    }
    Ok(())
}

/// Issuer and signature rules over the resolved tokens.
pub fn check_trust_policy(
    subject: &ResolvedToken,
    actor: Option<&ResolvedToken>,
    config: &ExchangeConfiguration,
) -> Result<(), ExchangeError> {
    for (role, token) in std::iter::once(("subject", subject)).chain(actor.map(|a| ("actor", a))) {
        if !config.is_issuer_trusted(&token.issuer) {
            warn!(role = role, issuer = %token.issuer, "Token issuer is not trusted");
            return Err(ExchangeError::token_validation("untrusted issuer"));
        }

        if config.validate_signature && !token.signature_verified {
            warn!(role = role, "Token signature was not verified");
            return Err(ExchangeError::token_validation("signature not verified"));
        }
    }
    Ok(())
}
