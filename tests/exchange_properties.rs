//! Property tests for request validation, delegation chains and scope negotiation.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;

use zentinel_token_exchange::exchange::delegation::build_act_claim;
use zentinel_token_exchange::exchange::policy::check_static_policy;
use zentinel_token_exchange::exchange::scope::{negotiate, ScopeSet};
use zentinel_token_exchange::exchange::{
    parse, ActClaim, ExchangeConfiguration, ResolvedToken, ScopePolicy, TokenType,
};
use zentinel_token_exchange::{ExchangeError, Violation};

fn token_type() -> impl Strategy<Value = TokenType> {
    prop::sample::select(TokenType::ALL.to_vec())
}

fn optional_value() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z0-9:/._-]{1,24}")
}

fn scope_value() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn scope_set() -> impl Strategy<Value = ScopeSet> {
    prop::collection::btree_set(scope_value(), 0..6)
}

/// Nested `act` claim with `depth` links.
fn act_chain(depth: u32) -> Option<Value> {
    (0..depth).fold(None, |inner, level| {
        let mut link = json!({ "sub": format!("service-{}", level) });
        if let Some(inner) = inner {
            link["act"] = inner;
        }
        Some(link)
    })
}

fn resolved(subject: &str, act: Option<Value>) -> ResolvedToken {
    let mut claims = HashMap::new();
    if let Some(act) = act {
        claims.insert("act".to_string(), act);
    }
    ResolvedToken {
        claims,
        issuer: "https://idp.example.com".to_string(),
        subject: subject.to_string(),
        scope: ScopeSet::new(),
        token_type: TokenType::AccessToken,
        signature_verified: true,
    }
}

fn insert_opt(params: &mut HashMap<String, String>, name: &str, value: Option<String>) {
    if let Some(value) = value {
        params.insert(name.to_string(), value);
    }
}

proptest! {
    #[test]
    fn missing_subject_token_is_invalid_request(
        subject_token_type in token_type(),
        audience in optional_value(),
        scope in optional_value(),
        actor_token in optional_value(),
    ) {
        let mut params = HashMap::new();
        params.insert("subject_token_type".to_string(), subject_token_type.as_urn().to_string());
        insert_opt(&mut params, "audience", audience);
        insert_opt(&mut params, "scope", scope);
        insert_opt(&mut params, "actor_token", actor_token);

        let err = parse(&params, "client", &ExchangeConfiguration::default()).unwrap_err();
        prop_assert_eq!(err, ExchangeError::invalid_request("missing subject_token"));
    }

    #[test]
    fn missing_subject_token_type_is_invalid_request(
        subject_token in "[A-Za-z0-9._-]{1,40}",
        requested in prop::option::of(token_type()),
    ) {
        let mut params = HashMap::new();
        params.insert("subject_token".to_string(), subject_token);
        insert_opt(&mut params, "requested_token_type", requested.map(|t| t.as_urn().to_string()));

        let err = parse(&params, "client", &ExchangeConfiguration::default()).unwrap_err();
        prop_assert_eq!(err, ExchangeError::invalid_request("missing subject_token_type"));
    }

    #[test]
    fn subject_type_outside_allow_list_is_unsupported(
        allowed in prop::collection::vec(token_type(), 1..4),
        presented in token_type(),
    ) {
        prop_assume!(!allowed.contains(&presented));
        let config = ExchangeConfiguration {
            allowed_subject_token_types: allowed,
            ..Default::default()
        };
        let mut params = HashMap::new();
        params.insert("subject_token".to_string(), "t".to_string());
        params.insert("subject_token_type".to_string(), presented.as_urn().to_string());

        let err = parse(&params, "client", &config).unwrap_err();
        prop_assert!(matches!(err, ExchangeError::UnsupportedTokenType(_)));
    }

    #[test]
    fn parse_is_deterministic(
        subject_token in "[A-Za-z0-9._-]{1,40}",
        audience in optional_value(),
        scope in optional_value(),
        resource in optional_value(),
    ) {
        let mut params = HashMap::new();
        params.insert("subject_token".to_string(), subject_token);
        params.insert("subject_token_type".to_string(), TokenType::Jwt.as_urn().to_string());
        insert_opt(&mut params, "audience", audience);
        insert_opt(&mut params, "scope", scope);
        insert_opt(&mut params, "resource", resource);

        let config = ExchangeConfiguration::default();
        prop_assert_eq!(parse(&params, "client", &config), parse(&params, "client", &config));
    }

    #[test]
    fn chain_depth_is_bounded(actor_depth in 0u32..6, max_depth in 0u32..6) {
        let config = ExchangeConfiguration {
            max_delegation_chain_depth: max_depth,
            ..Default::default()
        };
        let prior = act_chain(actor_depth);
        let subject = resolved("alice", None);
        let actor = resolved("service-actor", prior.clone());

        let outcome = build_act_claim(&subject, Some(&actor), &config);
        if actor_depth + 1 > max_depth {
            prop_assert_eq!(outcome.unwrap_err(), ExchangeError::PolicyViolation(Violation::ChainTooDeep));
        } else {
            let act = outcome.unwrap().unwrap();
            prop_assert_eq!(act.depth(), actor_depth + 1);
            prop_assert_eq!(act.sub.as_str(), "service-actor");
            prop_assert_eq!(act.act.map(|a| a.to_value()), prior);
        }
    }

    #[test]
    fn reduce_never_escalates(requested in scope_set(), subject in scope_set()) {
        let outcome = negotiate(&requested, &subject, ScopePolicy::Reduce);
        if requested.is_empty() {
            prop_assert_eq!(outcome.unwrap(), subject);
        } else if requested.is_subset(&subject) {
            prop_assert_eq!(outcome.unwrap(), requested);
        } else {
            prop_assert_eq!(outcome.unwrap_err(), ExchangeError::PolicyViolation(Violation::ScopeEscalation));
        }
    }

    #[test]
    fn preserve_always_returns_subject_scope(requested in scope_set(), subject in scope_set()) {
        prop_assert_eq!(negotiate(&requested, &subject, ScopePolicy::Preserve).unwrap(), subject);
    }

    #[test]
    fn act_claim_survives_json(depth in 1u32..6) {
        let value = act_chain(depth).unwrap();
        let act = ActClaim::from_value(&value).unwrap();
        prop_assert_eq!(act.depth(), depth);
        prop_assert_eq!(act.to_value(), value);
    }

    #[test]
    fn actor_without_type_is_invalid_request(
        subject_type in token_type(),
        actor_token in "[A-Za-z0-9._-]{1,40}",
    ) {
        let mut params = HashMap::new();
        params.insert("subject_token".to_string(), "t".to_string());
        params.insert("subject_token_type".to_string(), subject_type.as_urn().to_string());
        params.insert("actor_token".to_string(), actor_token);

        let config = ExchangeConfiguration {
            allowed_subject_token_types: TokenType::ALL.to_vec(),
            ..Default::default()
        };
        let err = parse(&params, "client", &config).unwrap_err();
        prop_assert_eq!(err, ExchangeError::invalid_request("missing actor_token_type"));
    }

    #[test]
    fn required_audience_accepts_any_value(audience in optional_value()) {
        let config = ExchangeConfiguration {
            require_audience: true,
            ..Default::default()
        };
        let mut params = HashMap::new();
        params.insert("subject_token".to_string(), "t".to_string());
        params.insert("subject_token_type".to_string(), TokenType::AccessToken.as_urn().to_string());
        insert_opt(&mut params, "audience", audience.clone());

        let outcome = parse(&params, "client", &config);
        match audience {
            Some(audience) => prop_assert_eq!(outcome.unwrap().audience, Some(audience)),
            None => prop_assert_eq!(outcome.unwrap_err(), ExchangeError::invalid_request("missing audience")),
        }
    }

    #[test]
    fn delegation_switch_governs_actor_requests(
        allow_delegation in any::<bool>(),
        actor_type in prop::sample::select(vec![TokenType::AccessToken, TokenType::Jwt]),
    ) {
        let config = ExchangeConfiguration {
            allow_delegation,
            ..Default::default()
        };
        let mut params = HashMap::new();
        params.insert("subject_token".to_string(), "t".to_string());
        params.insert("subject_token_type".to_string(), TokenType::AccessToken.as_urn().to_string());
        params.insert("actor_token".to_string(), "a".to_string());
        params.insert("actor_token_type".to_string(), actor_type.as_urn().to_string());

        let request = parse(&params, "client", &config).unwrap();
        let outcome = check_static_policy(&request, &config);
        if allow_delegation {
            prop_assert!(outcome.is_ok());
        } else {
            prop_assert_eq!(outcome.unwrap_err(), ExchangeError::PolicyViolation(Violation::DelegationNotAllowed));
        }
    }
}

#[test]
fn subject_only_request_passes_validation_and_static_policy() {
    let config = ExchangeConfiguration {
        allowed_subject_token_types: vec![TokenType::AccessToken, TokenType::Jwt, TokenType::IdToken],
        allowed_actor_token_types: vec![TokenType::AccessToken, TokenType::Jwt],
        allow_delegation: true,
        allow_impersonation: false,
        require_audience: false,
        max_delegation_chain_depth: 3,
        scope_policy: ScopePolicy::Reduce,
        ..Default::default()
    };
    let mut params = HashMap::new();
    params.insert("subject_token".to_string(), "t".to_string());
    params.insert("subject_token_type".to_string(), TokenType::AccessToken.as_urn().to_string());

    let request = parse(&params, "client", &config).unwrap();
    assert_eq!(request.requested_token_type, TokenType::AccessToken);
    assert!(request.actor.is_none());
    assert!(check_static_policy(&request, &config).is_ok());
}
