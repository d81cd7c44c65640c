use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::{error::Error as StdError, fmt, str::FromStr};

use crate::services::auth::token::{Claims, JwtToken, Token};

/// Verifies a raw bearer value.
///
/// Implementations must not panic or return errors: every failure is an
/// `Token::Invalid` carrying the reason.
pub trait VerifyTokenService: Send + Sync {
    fn verify(&self, raw: &str) -> Token;
}

// Errors raised while building the verifier from configuration.
#[derive(Debug)]
pub enum VerifierError {
    UnsupportedAlgorithm(String),
    InvalidKey(jsonwebtoken::errors::Error),
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported token algorithm: {}", alg),
            Self::InvalidKey(e) => write!(f, "invalid token verification key: {}", e),
        }
    }
}

impl StdError for VerifierError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::InvalidKey(e) => Some(e),
            _ => None,
        }
    }
}

/// Signature algorithms accepted from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlgorithm {
    Rs256,
    Es256,
    EdDsa,
    Hs256,
}

impl FromStr for TokenAlgorithm {
    type Err = VerifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            "EDDSA" => Ok(Self::EdDsa),
            "HS256" => Ok(Self::Hs256),
            _ => Err(VerifierError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl TokenAlgorithm {
    fn algorithm(self) -> Algorithm {
        match self {
            Self::Rs256 => Algorithm::RS256,
            Self::Es256 => Algorithm::ES256,
            Self::EdDsa => Algorithm::EdDSA,
            Self::Hs256 => Algorithm::HS256,
        }
    }

    // PEM public key for asymmetric algorithms, shared secret for HS256.
    fn decoding_key(self, key: &str) -> Result<DecodingKey, VerifierError> {
        let bytes = key.as_bytes();
        let key = match self {
            Self::Rs256 => DecodingKey::from_rsa_pem(bytes),
            Self::Es256 => DecodingKey::from_ec_pem(bytes),
            Self::EdDsa => DecodingKey::from_ed_pem(bytes),
            Self::Hs256 => Ok(DecodingKey::from_secret(bytes)),
        };
        key.map_err(VerifierError::InvalidKey)
    }
}

/// JWT verifier for both access and identity tokens.
///
/// Checks signature, `exp`/`nbf` (with leeway) and `iss`. Audience is an
/// application-level rule and is checked by the authorizer instead.
#[derive(Clone)]
pub struct JwtVerifyTokenService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifyTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("JwtVerifyTokenService")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtVerifyTokenService {
    pub fn new(
        algorithm: TokenAlgorithm,
        key: &str,
        issuer: &str,
        leeway_seconds: u64,
    ) -> Result<Self, VerifierError> {
        let decoding_key = algorithm.decoding_key(key)?;

        let mut validation = Validation::new(algorithm.algorithm());
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = leeway_seconds;

        Ok(Self {
            decoding_key,
            validation,
        })
    }
}

impl VerifyTokenService for JwtVerifyTokenService {
    fn verify(&self, raw: &str) -> Token {
        match jsonwebtoken::decode::<Map<String, Value>>(raw, &self.decoding_key, &self.validation)
        {
            Ok(data) => Token::Valid(JwtToken::new(raw, Claims::from(data.claims))),
            Err(err) => {
                tracing::debug!(error = %err, "token verification failed");
                Token::invalid(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "verify-test-secret";
    const ISSUER: &str = "https://idp.example.com/";

    fn sign(claims: Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> JwtVerifyTokenService {
        JwtVerifyTokenService::new(TokenAlgorithm::Hs256, SECRET, ISSUER, 0).unwrap()
    }

    fn far_future() -> u64 {
        4_102_444_800 // 2100-01-01
    }

    #[test]
    fn valid_token_exposes_claims() {
        let raw = sign(json!({
            "iss": ISSUER,
            "sub": "user-1",
            "exp": far_future(),
            "groups": ["a", "b"],
        }));

        let token = verifier().verify(&raw);
        let jwt = token.as_valid().expect("token should verify");
        assert_eq!(jwt.raw(), raw);
        assert_eq!(jwt.claims().subject(), Some("user-1"));
        assert!(jwt.claims().get("groups").is_some());
    }

    #[test]
    fn expired_token_is_invalid() {
        let raw = sign(json!({ "iss": ISSUER, "sub": "user-1", "exp": 1_000 }));
        assert!(matches!(verifier().verify(&raw), Token::Invalid(_)));
    }

    #[test]
    fn wrong_issuer_is_invalid() {
        let raw = sign(json!({ "iss": "https://evil.example.com/", "exp": far_future() }));
        assert!(!verifier().verify(&raw).is_valid());
    }

    #[test]
    fn garbage_is_invalid_with_reason() {
        match verifier().verify("not-a-jwt") {
            Token::Invalid(invalid) => assert!(!invalid.reason().is_empty()),
            Token::Valid(_) => panic!("garbage must not verify"),
        }
    }

    #[test]
    fn algorithm_parsing() {
        assert_eq!("rs256".parse::<TokenAlgorithm>().unwrap(), TokenAlgorithm::Rs256);
        assert_eq!("EdDSA".parse::<TokenAlgorithm>().unwrap(), TokenAlgorithm::EdDsa);
        assert!("none".parse::<TokenAlgorithm>().is_err());
    }

    #[test]
    fn bad_pem_is_rejected() {
        let err = JwtVerifyTokenService::new(TokenAlgorithm::Rs256, "not a pem", ISSUER, 0);
        assert!(matches!(err, Err(VerifierError::InvalidKey(_))));
    }
}
