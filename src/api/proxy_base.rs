//! Public address of the proxy as seen by the client

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Uri};
use tracing::debug;

use super::server::AppState;
use crate::error::{MirageError, Result};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// `scheme://host[:port]` every rewritten URL points back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyBase(String);

impl ProxyBase {
    /// Derive the base from forwarding headers, then `Host`, then the URI authority
    pub fn from_request(headers: &HeaderMap, uri: &Uri, default_scheme: &str) -> Result<Self> {
        let scheme = first_value(headers, X_FORWARDED_PROTO)
            .map(|s| s.to_ascii_lowercase())
            .filter(|s| s == "http" || s == "https")
            .unwrap_or_else(|| default_scheme.to_string());

        let host = first_value(headers, X_FORWARDED_HOST)
            .or_else(|| first_value(headers, header::HOST.as_str()))
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .ok_or_else(|| MirageError::InvalidRequest("missing Host header".into()))?;

        if !is_valid_host(&host) {
            debug!(host = %host, "Rejecting unusable host");
            return Err(MirageError::InvalidRequest(format!("invalid host: {}", host)));
        }

        Ok(Self(format!("{}://{}", scheme, host)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProxyBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for ProxyBase {
    type Rejection = MirageError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        Self::from_request(&parts.headers, &parts.uri, &state.public_scheme)
    }
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Hostname, IPv4, bracketed IPv6, optional port.
fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 255
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn base(pairs: &[(&'static str, &'static str)]) -> Result<ProxyBase> {
        ProxyBase::from_request(&headers(pairs), &Uri::from_static("/"), "http")
    }

    #[test]
    fn test_host_header_with_default_scheme() {
        let base = base(&[("host", "localhost:8080")]).unwrap();
        assert_eq!(base.as_str(), "http://localhost:8080");
    }

    #[test]
    fn test_forwarded_headers_win() {
        let base = base(&[
            ("host", "10.0.0.5:8080"),
            ("x-forwarded-host", "mirror.example.com, 10.0.0.1"),
            ("x-forwarded-proto", "HTTPS"),
        ])
        .unwrap();
        assert_eq!(base.to_string(), "https://mirror.example.com");
    }

    #[test]
    fn test_unknown_forwarded_proto_falls_back() {
        let base = base(&[("host", "proxy.local"), ("x-forwarded-proto", "gopher")]).unwrap();
        assert_eq!(base.as_str(), "http://proxy.local");
    }

    #[test]
    fn test_authority_from_absolute_uri() {
        let base = ProxyBase::from_request(
            &HeaderMap::new(),
            &Uri::from_static("http://[::1]:8080/?url=x"),
            "https",
        )
        .unwrap();
        assert_eq!(base.as_str(), "https://[::1]:8080");
    }

    #[test]
    fn test_missing_or_hostile_host_rejected() {
        assert!(matches!(base(&[]), Err(MirageError::InvalidRequest(_))));
        assert!(base(&[("host", "evil.example/\"><script>")]).is_err());
        assert!(base(&[("host", "a b")]).is_err());
    }
}
