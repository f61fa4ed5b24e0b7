//! Caller identity resolution
//!
//! An [`Identity`] is the bucket key used for both the free-tier quota and
//! entitlement lookups. It is derived from network addressing only and is
//! trivially spoofable by anyone who controls the `X-Forwarded-For` header:
//! treat it as best-effort anonymous rate limiting, not authentication.

use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use http::request::Parts;
use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header set by the upstream proxy with the client address chain
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Opaque caller key derived from request addressing
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a raw identity string
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Borrow the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether resolution produced nothing usable
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve the caller identity from request metadata.
    ///
    /// Prefers the first entry of `X-Forwarded-For`; falls back to the
    /// transport peer address. Never fails, but may return an empty identity
    /// when neither source is available.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());

        match forwarded {
            Some(addr) => Self::new(addr),
            None => Self::new(peer.map(|p| p.ip().to_string()).unwrap_or_default()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Axum extractor resolving the caller [`Identity`].
///
/// Reads the peer address from [`ConnectInfo`] when the server was started
/// with connect info; otherwise relies on the forwarded header alone.
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(Identity::resolve(&parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.7:51234".parse().unwrap())
    }

    #[test]
    fn test_forwarded_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            FORWARDED_FOR_HEADER,
            HeaderValue::from_static(" 203.0.113.9 , 70.41.3.18, 150.172.238.178"),
        );
        assert_eq!(Identity::resolve(&headers, peer()).as_str(), "203.0.113.9");
    }

    #[test]
    fn test_falls_back_to_peer() {
        let headers = HeaderMap::new();
        assert_eq!(Identity::resolve(&headers, peer()).as_str(), "10.0.0.7");
    }

    #[test]
    fn test_empty_forwarded_entry_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(" ,1.2.3.4"));
        assert_eq!(Identity::resolve(&headers, peer()).as_str(), "10.0.0.7");
    }

    #[test]
    fn test_nothing_available_is_empty() {
        let identity = Identity::resolve(&HeaderMap::new(), None);
        assert!(identity.is_empty());
    }

    #[test]
    fn test_ipv6_peer() {
        let addr: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let identity = Identity::resolve(&HeaderMap::new(), Some(addr));
        assert_eq!(identity.to_string(), "2001:db8::1");
    }
}
