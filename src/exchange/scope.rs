//! Scope negotiation between the request and the subject token.

use std::collections::BTreeSet;

use super::config::ScopePolicy;
use crate::error::{ExchangeError, Violation};

/// Ordered, de-duplicated set of scope values.
pub type ScopeSet = BTreeSet<String>;

/// Split a space-delimited scope string.
pub fn parse_scope(scope: &str) -> ScopeSet {
    scope.split_whitespace().map(String::from).collect()
}

/// Render a scope set as a space-delimited string.
pub fn format_scope(scopes: &ScopeSet) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Compute the scopes of the issued token.
pub fn negotiate(
    requested: &ScopeSet,
    subject_scope: &ScopeSet,
    policy: ScopePolicy,
) -> Result<ScopeSet, ExchangeError> {
    match policy {
        ScopePolicy::Preserve => Ok(subject_scope.clone()),
        ScopePolicy::Reduce => {
            if requested.is_empty() {
                return Ok(subject_scope.clone());
            }
            if !requested.is_subset(subject_scope) {
                return Err(Violation::ScopeEscalation.into());
            }
            Ok(requested.clone())
        }
        ScopePolicy::Custom => Ok(requested.clone()),
    }
}
