//! Per-application access policy.
//!
//! Applications are looked up by the host of the forwarded request. The
//! lookup is total: an unknown host gets the default application. Fields an
//! application leaves unset are inherited from the default application.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SCOPE: &str = "openid profile email";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read applications file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse applications file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("application '{name}': {message}")]
    Invalid { name: String, message: String },
}

/// Resolved policy of one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPolicy {
    pub name: String,
    pub client_id: String,
    pub audience: Option<String>,
    pub scope: String,
    pub redirect_uri: String,
    pub token_cookie_domain: String,
    /// Identity-token claims exposed to upstream services.
    pub claims: Vec<String>,
    /// Identity-token claim name -> value that must be present.
    pub required_claims: BTreeMap<String, String>,
    /// Permissions the access token must grant.
    pub required_permissions: Vec<String>,
}

impl ApplicationPolicy {
    /// Structural check of the access rules; a malformed rule cannot be
    /// evaluated and must not be treated as "no rule".
    pub fn validate_rules(&self) -> Result<(), String> {
        for (name, expected) in &self.required_claims {
            if name.trim().is_empty() {
                return Err(format!("application '{}' requires a claim with an empty name", self.name));
            }
            if expected.trim().is_empty() {
                return Err(format!(
                    "application '{}' requires claim '{}' with an empty value",
                    self.name, name
                ));
            }
        }
        if self.required_permissions.iter().any(|p| p.trim().is_empty()) {
            return Err(format!("application '{}' requires an empty permission", self.name));
        }
        Ok(())
    }

    pub fn has_rules(&self) -> bool {
        !self.required_claims.is_empty() || !self.required_permissions.is_empty()
    }
}

/// Application entry as written in the applications file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub token_cookie_domain: Option<String>,
    #[serde(default)]
    pub claims: Option<Vec<String>>,
    #[serde(default)]
    pub required_claims: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub required_permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationsFile {
    pub default: ApplicationConfig,
    #[serde(default, rename = "application")]
    pub applications: Vec<ApplicationConfig>,
}

/// Authorize endpoint plus every configured application. Read-only while
/// serving requests.
#[derive(Debug, Clone)]
pub struct AuthorizeProperties {
    pub authorize_url: Url,
    default_application: ApplicationPolicy,
    applications: HashMap<String, ApplicationPolicy>,
}

impl AuthorizeProperties {
    pub fn new(
        authorize_url: Url,
        default_application: ApplicationPolicy,
        applications: impl IntoIterator<Item = ApplicationPolicy>,
    ) -> Self {
        let applications = applications
            .into_iter()
            .map(|app| (app.name.to_ascii_lowercase(), app))
            .collect();

        Self {
            authorize_url,
            default_application,
            applications,
        }
    }

    /// Resolve the parsed applications file, applying default-field fallback.
    pub fn from_file(authorize_url: Url, file: ApplicationsFile) -> Result<Self, PolicyError> {
        let default = resolve_default(file.default)?;
        let applications = file
            .applications
            .into_iter()
            .map(|app| resolve_with_fallback(app, &default))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(authorize_url, default, applications))
    }

    pub fn load<P: AsRef<Path>>(authorize_url: Url, path: P) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path)?;
        let file: ApplicationsFile = toml::from_str(&content)?;
        Self::from_file(authorize_url, file)
    }

    /// Total lookup by host (case-insensitive, port ignored).
    pub fn find_application_or_default(&self, host: &str) -> &ApplicationPolicy {
        let host = strip_port(host).to_ascii_lowercase();
        self.applications
            .get(&host)
            .unwrap_or(&self.default_application)
    }

    pub fn default_application(&self) -> &ApplicationPolicy {
        &self.default_application
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }
}

// `[::1]:8443` -> `[::1]`, `app.example.com:8443` -> `app.example.com`
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

fn required(name: &str, field: &'static str, value: Option<String>) -> Result<String, PolicyError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PolicyError::Invalid {
            name: name.to_string(),
            message: format!("missing '{}'", field),
        }),
    }
}

fn resolve_default(app: ApplicationConfig) -> Result<ApplicationPolicy, PolicyError> {
    let name = if app.name.is_empty() {
        "default".to_string()
    } else {
        app.name
    };

    Ok(ApplicationPolicy {
        client_id: required(&name, "client_id", app.client_id)?,
        redirect_uri: required(&name, "redirect_uri", app.redirect_uri)?,
        token_cookie_domain: required(&name, "token_cookie_domain", app.token_cookie_domain)?,
        audience: app.audience,
        scope: app.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
        claims: app.claims.unwrap_or_default(),
        required_claims: app.required_claims.unwrap_or_default(),
        required_permissions: app.required_permissions.unwrap_or_default(),
        name,
    })
}

fn resolve_with_fallback(
    app: ApplicationConfig,
    default: &ApplicationPolicy,
) -> Result<ApplicationPolicy, PolicyError> {
    if app.name.trim().is_empty() {
        return Err(PolicyError::Invalid {
            name: String::new(),
            message: "missing 'name'".to_string(),
        });
    }

    Ok(ApplicationPolicy {
        client_id: app.client_id.unwrap_or_else(|| default.client_id.clone()),
        audience: app.audience.or_else(|| default.audience.clone()),
        scope: app.scope.unwrap_or_else(|| default.scope.clone()),
        redirect_uri: app.redirect_uri.unwrap_or_else(|| default.redirect_uri.clone()),
        token_cookie_domain: app
            .token_cookie_domain
            .unwrap_or_else(|| default.token_cookie_domain.clone()),
        claims: app.claims.unwrap_or_else(|| default.claims.clone()),
        required_claims: app
            .required_claims
            .unwrap_or_else(|| default.required_claims.clone()),
        required_permissions: app
            .required_permissions
            .unwrap_or_else(|| default.required_permissions.clone()),
        name: app.name,
    })
}
