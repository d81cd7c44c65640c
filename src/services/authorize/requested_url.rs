use std::fmt;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestedUrlError {
    #[error("empty '{0}' in requested url")]
    Empty(&'static str),
    #[error("unsupported http method: {0}")]
    InvalidMethod(String),
}

const METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

/// The request the proxy asked about: where the caller wanted to go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequestedUrl", into = "RawRequestedUrl")]
pub struct RequestedUrl {
    protocol: String,
    host: String,
    uri: String,
    method: Method,
}

impl RequestedUrl {
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        uri: impl Into<String>,
        method: &str,
    ) -> Result<Self, RequestedUrlError> {
        let protocol = non_empty("protocol", protocol.into())?;
        let host = non_empty("host", host.into())?;
        let uri = non_empty("uri", uri.into())?;
        let method = non_empty("method", method.to_string())?;

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .ok()
            .filter(|m| METHODS.contains(m))
            .ok_or(RequestedUrlError::InvalidMethod(method))?;

        Ok(Self {
            protocol,
            host,
            uri,
            method,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Display for RequestedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.protocol, self.host, self.uri)
    }
}

fn non_empty(field: &'static str, value: String) -> Result<String, RequestedUrlError> {
    if value.trim().is_empty() {
        Err(RequestedUrlError::Empty(field))
    } else {
        Ok(value)
    }
}

// Wire shape inside an encoded AuthorizeState.
#[derive(Serialize, Deserialize)]
struct RawRequestedUrl {
    protocol: String,
    host: String,
    uri: String,
    method: String,
}

impl TryFrom<RawRequestedUrl> for RequestedUrl {
    type Error = RequestedUrlError;

    fn try_from(raw: RawRequestedUrl) -> Result<Self, Self::Error> {
        RequestedUrl::new(raw.protocol, raw.host, raw.uri, &raw.method)
    }
}

impl From<RequestedUrl> for RawRequestedUrl {
    fn from(url: RequestedUrl) -> Self {
        Self {
            protocol: url.protocol,
            host: url.host,
            uri: url.uri,
            method: url.method.to_string(),
        }
    }
}
