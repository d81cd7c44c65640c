//! `state` parameter carried through the identity provider.
//!
//! Format: `base64url(json payload) "." base64url(HMAC-SHA256(json payload))`.
//! The MAC is checked (constant time) before the payload is parsed, so a
//! tampered state never decodes into a different `RequestedUrl`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::services::authorize::nonce::AuthorizeNonce;
use crate::services::authorize::requested_url::RequestedUrl;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("malformed state")]
    Malformed,
    #[error("state signature mismatch")]
    SignatureMismatch,
    #[error("invalid state payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("nonce missing on callback")]
    NonceMissing,
    #[error("nonce mismatch on callback")]
    NonceMismatch,
}

/// Original request + the nonce issued for this redirect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeState {
    pub requested_url: RequestedUrl,
    pub nonce: AuthorizeNonce,
}

impl AuthorizeState {
    pub fn create(requested_url: RequestedUrl, nonce: AuthorizeNonce) -> Self {
        Self {
            requested_url,
            nonce,
        }
    }
}

/// Signs and verifies encoded [`AuthorizeState`] values.
#[derive(Clone)]
pub struct StateSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for StateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("StateSigner").finish_non_exhaustive()
    }
}

impl StateSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    fn mac(&self) -> HmacSha256 {
        match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("hmac accepts keys of any length"),
        }
    }

    pub fn encode(&self, state: &AuthorizeState) -> Result<String, StateError> {
        let payload = serde_json::to_vec(state)?;

        let mut mac = self.mac();
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    pub fn decode(&self, encoded: &str) -> Result<AuthorizeState, StateError> {
        let (payload, signature) = encoded.split_once('.').ok_or(StateError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| StateError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| StateError::Malformed)?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| StateError::SignatureMismatch)?;

        Ok(serde_json::from_slice(&payload)?)
    }

    /// Callback-side check: the state must be authentic and its nonce must
    /// equal the one presented by the browser. Returns where to send the
    /// caller back to.
    pub fn verify_callback(
        &self,
        encoded: &str,
        presented_nonce: Option<&str>,
    ) -> Result<RequestedUrl, StateError> {
        let state = self.decode(encoded)?;
        let presented = presented_nonce
            .filter(|n| !n.is_empty())
            .ok_or(StateError::NonceMissing)?;

        if !constant_time_eq(state.nonce.value().as_bytes(), presented.as_bytes()) {
            tracing::warn!(host = %state.requested_url.host(), "nonce mismatch on callback");
            return Err(StateError::NonceMismatch);
        }

        Ok(state.requested_url)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
