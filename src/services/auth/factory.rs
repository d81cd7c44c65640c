/// Factory: build the verifier, principal resolver and authorize handler from `Config`.
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::services::auth::principal::PrincipalResolver;
use crate::services::auth::verify::{JwtVerifyTokenService, VerifyTokenService};
use crate::services::authorize::{AuthorizeHandler, StateSigner};
use crate::services::policy::AuthorizeProperties;

#[derive(Clone, Debug)]
pub struct AuthorizeServices {
    pub resolver: Arc<PrincipalResolver>,
    pub handler: Arc<AuthorizeHandler>,
}

pub fn build_authorize_services(config: &Config) -> Result<AuthorizeServices> {
    let verifier = JwtVerifyTokenService::new(
        config.token_algorithm,
        &config.token_key,
        &config.token_issuer,
        config.token_leeway_seconds,
    )
    .context("failed to build token verifier")?;

    let properties = AuthorizeProperties::load(
        config.authorize_url.clone(),
        &config.applications_file,
    )
    .with_context(|| {
        format!(
            "failed to load applications from {}",
            config.applications_file.display()
        )
    })?;

    tracing::info!(
        applications = properties.application_count(),
        default = %properties.default_application().name,
        "loaded application policies"
    );

    Ok(assemble(
        Arc::new(verifier),
        properties,
        StateSigner::new(config.state_secret.as_bytes().to_vec()),
    ))
}

/// Wire already-built parts together (also used by tests with fake verifiers).
pub fn assemble(
    verifier: Arc<dyn VerifyTokenService>,
    properties: AuthorizeProperties,
    signer: StateSigner,
) -> AuthorizeServices {
    AuthorizeServices {
        resolver: Arc::new(PrincipalResolver::new(verifier)),
        handler: Arc::new(AuthorizeHandler::new(Arc::new(properties), signer)),
    }
}
