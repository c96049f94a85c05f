//! Removes headers that would stop a proxied page from working under the
//! proxy's origin

use axum::response::Response;

/// Headers cleared from every response
pub const STRIPPED_HEADERS: &[&str] = &[
    "x-frame-options",
    "content-security-policy",
    "content-security-policy-report-only",
    "strict-transport-security",
    "permissions-policy",
    "x-content-type-options",
    "referrer-policy",
    "feature-policy",
];

pub async fn strip_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for name in STRIPPED_HEADERS {
        headers.remove(*name);
    }
    response
}
