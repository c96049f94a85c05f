//! Reference resolution and proxy URL construction

use url::Url;

use crate::error::{MirageError, Result};

/// Validate a caller-supplied target: absolute, `http`/`https`, with a host.
pub fn validate_target(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MirageError::InvalidRequest("url parameter is empty".into()));
    }

    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(MirageError::InvalidRequest(format!(
                "unsupported scheme: {}",
                other
            )))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(MirageError::InvalidRequest("url has no host".into()));
    }

    Ok(url)
}

/// Resolve `reference` against `base` into an absolute http(s) URL.
///
/// Absolute references come back byte-for-byte; protocol-relative ones
/// take the scheme of `base`; root-relative ones are joined to the origin
/// of `base`; anything else is joined to the directory of `base`.
///
/// `data:` references must be filtered out by the caller.
pub fn resolve(reference: &str, base: &Url) -> Result<String> {
    let reference = reference.trim();

    let candidate = if has_http_scheme(reference) {
        reference.to_string()
    } else if reference.starts_with("//") {
        format!("{}:{}", base.scheme(), reference)
    } else if reference.starts_with('/') {
        format!("{}{}", origin_of(base), reference)
    } else {
        format!("{}{}", directory_of(base), reference)
    };

    let parsed = Url::parse(&candidate)
        .map_err(|e| MirageError::MalformedReference(format!("{}: {}", reference, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(MirageError::MalformedReference(reference.to_string()));
    }

    // Path-relative joins may contain dot segments; hand back the
    // normalized form. Everything else is returned as written.
    if reference.starts_with('/') || has_http_scheme(reference) {
        Ok(candidate)
    } else {
        Ok(parsed.into())
    }
}

/// Build `endpoint?url=<percent-encoded absolute>`
pub fn proxied(endpoint: &str, absolute: &str) -> String {
    format!("{}?url={}", endpoint, urlencoding::encode(absolute))
}

/// `scheme://host[:port]` of a URL
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

fn directory_of(base: &Url) -> String {
    let mut dir = base.clone();
    dir.set_query(None);
    dir.set_fragment(None);
    let s = dir.as_str();
    match s.rfind('/') {
        Some(idx) => s[..=idx].to_string(),
        None => format!("{}/", s),
    }
}

fn has_http_scheme(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
