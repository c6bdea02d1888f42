//! Claim mapping from the subject token into the issued token.

use serde_json::Value;
use std::collections::HashMap;

use super::config::ClaimMapping;

/// Copy the configured claims of the subject token, in configuration order.
///
/// Later mappings that target the same claim overwrite earlier ones. Claims
/// without a mapping are not copied.
pub fn map_claims(
    subject_claims: &HashMap<String, Value>,
    mappings: &[ClaimMapping],
) -> HashMap<String, Value> {
    let mut mapped = HashMap::new();
    for mapping in mappings {
        if let Some(value) = subject_claims.get(&mapping.source_claim) {
            mapped.insert(mapping.target_claim.clone(), value.clone());
        }
    }
    mapped
}
