use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// 32 bytes of entropy -> 43 chars of URL-safe base64 without padding.
const NONCE_BYTES: usize = 32;
pub const NONCE_LENGTH: usize = 43;

#[derive(Debug, Error)]
#[error("failed to generate nonce: {0}")]
pub struct NonceError(getrandom::Error);

/// Single-use correlator binding a redirect to its callback.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizeNonce(String);

impl AuthorizeNonce {
    pub fn generate() -> Result<Self, NonceError> {
        let mut bytes = [0u8; NONCE_BYTES];
        getrandom::fill(&mut bytes).map_err(NonceError)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthorizeNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthorizeNonce").field(&"***").finish()
    }
}

impl fmt::Display for AuthorizeNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
