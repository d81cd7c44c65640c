//! Verified / invalid bearer tokens and their claim sets.
//!
//! Claims are classified once, when the token is verified, into a tagged
//! [`ClaimValue`]. Everything downstream (policy checks, user-info headers)
//! pattern-matches on that tag instead of probing JSON shapes again.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// A single claim value, classified at verification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    String(String),
    StringArray(Vec<String>),
    Boolean(bool),
    Integer(i64),
    // null, floats, objects, mixed arrays
    Unknown,
}

impl ClaimValue {
    /// Textual representation used for user-info headers.
    ///
    /// Returns `None` when the claim has no usable representation
    /// (unknown type or empty text).
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            ClaimValue::StringArray(values) => values.join(", "),
            ClaimValue::Boolean(b) => b.to_string(),
            ClaimValue::String(s) => s.clone(),
            ClaimValue::Integer(n) => n.to_string(),
            ClaimValue::Unknown => return None,
        };

        if text.is_empty() { None } else { Some(text) }
    }

    /// Whether the claim satisfies an expected value from a policy rule.
    ///
    /// Arrays match on membership, scalars on textual equality.
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            ClaimValue::String(s) => s == expected,
            ClaimValue::StringArray(values) => values.iter().any(|v| v == expected),
            ClaimValue::Boolean(b) => b.to_string() == expected,
            ClaimValue::Integer(n) => n.to_string() == expected,
            ClaimValue::Unknown => false,
        }
    }
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ClaimValue::String(s),
            Value::Bool(b) => ClaimValue::Boolean(b),
            Value::Number(n) => n.as_i64().map_or(ClaimValue::Unknown, ClaimValue::Integer),
            Value::Array(items) => {
                let strings: Option<Vec<String>> = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                strings.map_or(ClaimValue::Unknown, ClaimValue::StringArray)
            }
            Value::Null | Value::Object(_) => ClaimValue::Unknown,
        }
    }
}

/// Claim set of a verified token, ordered by claim name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ClaimValue) {
        self.0.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }

    /// `sub` claim, when it is a non-empty string.
    pub fn subject(&self) -> Option<&str> {
        match self.get("sub") {
            Some(ClaimValue::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Whether `aud` (string or string array) contains `audience`.
    pub fn has_audience(&self, audience: &str) -> bool {
        self.get("aud").is_some_and(|aud| aud.matches(audience))
    }

    /// Whether the token grants `permission`, either through a `permissions`
    /// array or a space-separated `scope` string.
    pub fn has_permission(&self, permission: &str) -> bool {
        if let Some(ClaimValue::StringArray(perms)) = self.get("permissions") {
            if perms.iter().any(|p| p == permission) {
                return true;
            }
        }
        match self.get("scope") {
            Some(ClaimValue::String(scope)) => scope.split(' ').any(|s| s == permission),
            _ => false,
        }
    }
}

impl From<serde_json::Map<String, Value>> for Claims {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(name, value)| (name, ClaimValue::from(value)))
                .collect(),
        )
    }
}

impl FromIterator<(String, ClaimValue)> for Claims {
    fn from_iter<I: IntoIterator<Item = (String, ClaimValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A token whose signature, expiry and issuer have been verified.
#[derive(Clone, PartialEq, Eq)]
pub struct JwtToken {
    raw: String,
    claims: Claims,
}

impl JwtToken {
    pub fn new(raw: impl Into<String>, claims: Claims) -> Self {
        Self {
            raw: raw.into(),
            claims,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

impl fmt::Debug for JwtToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the bearer value
        f.debug_struct("JwtToken")
            .field("claims", &self.claims)
            .finish()
    }
}

/// A missing or rejected token, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidToken {
    reason: String,
}

impl InvalidToken {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Outcome of token verification. There is no "absent" token: absence is an
/// [`InvalidToken`] with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Valid(JwtToken),
    Invalid(InvalidToken),
}

impl Token {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Token::Invalid(InvalidToken::new(reason))
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Token::Valid(_))
    }

    pub fn as_valid(&self) -> Option<&JwtToken> {
        match self {
            Token::Valid(token) => Some(token),
            Token::Invalid(_) => None,
        }
    }
}
