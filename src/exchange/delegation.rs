//! Delegation chains (`act` claim, RFC 8693 section 4.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::config::ExchangeConfiguration;
use super::resolver::ResolvedToken;
use crate::error::{ExchangeError, Violation};

/// One link of a delegation chain. The nested `act` names the party that
/// acted before this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActClaim {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub act: Option<Box<ActClaim>>,
}

impl ActClaim {
    /// Number of links in this chain, counting `self`.
    pub fn depth(&self) -> u32 {
        let mut depth = 1;
        let mut current = self;
        while let Some(ref next) = current.act {
            depth += 1;
            current = next;
        }
        depth
    }

    /// Parse an `act` claim value.
    pub fn from_value(value: &Value) -> Result<Self, ExchangeError> {
        serde_json::from_value(value.clone())
            .map_err(|_| ExchangeError::token_validation("malformed act claim"))
    }

    /// Read the `act` claim of a token, if it carries one.
    pub fn from_claims(claims: &HashMap<String, Value>) -> Result<Option<Self>, ExchangeError> {
        match claims.get("act") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Self::from_value(value).map(Some),
        }
    }

    pub fn to_value(&self) -> Value {
        // Only strings and nested objects: serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Build the `act` claim of the issued token.
///
/// Without an actor the subject keeps its identity and no claim is produced.
/// With an actor, one link is prepended to the actor's own chain, which is
/// carried over unchanged.
pub fn build_act_claim(
    _subject: &ResolvedToken,
    actor: Option<&ResolvedToken>,
    config: &ExchangeConfiguration,
) -> Result<Option<ActClaim>, ExchangeError> {
    let Some(actor) = actor else {
        return Ok(None);
    };

    let prior = ActClaim::from_claims(&actor.claims)?;
    let depth = 1 + prior.as_ref().map_or(0, ActClaim::depth);

    if depth > config.max_delegation_chain_depth {
        return Err(Violation::ChainTooDeep.into());
    }

    Ok(Some(ActClaim {
        sub: actor.subject.clone(),
        iss: Some(actor.issuer.clone()),
        act: prior.map(Box::new),
    }))
}
