//! Projection of identity-token claims into the user-info map handed to
//! upstream services.

use std::collections::BTreeMap;

use crate::services::auth::token::Claims;

/// Filter by allow-list, coerce to text, drop what has no representation.
///
/// Claim names outside `allowed` never reach the result; neither do claims of
/// unknown type or with an empty textual value.
pub fn extract_userinfo(claims: &Claims, allowed: &[String]) -> BTreeMap<String, String> {
    for name in allowed {
        tracing::trace!(claim = %name, "should add claim from token");
    }

    claims
        .iter()
        .filter(|(name, _)| allowed.iter().any(|a| a == *name))
        .filter_map(|(name, value)| {
            let text = value.as_text();
            tracing::trace!(claim = %name, value = ?text, "filtered claim");
            text.map(|text| (name.clone(), text))
        })
        .collect()
}
