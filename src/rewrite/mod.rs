//! Content rewriting
//!
//! Turns every URL a payload would make the client fetch into a callback
//! through the proxy. Rewriting is pattern based, not a parser: anything
//! that looks like a URL in a rewritable position is rewritten.

pub mod css;
pub mod html;
mod intercept;
pub mod js;
pub mod url;

use ::url::Url;

pub use self::url::{proxied, resolve, validate_target};

/// Endpoint paths relative to the proxy base address
pub const PAGE_PATH: &str = "/";
pub const ASSET_PATH: &str = "/asset";

/// Per-pass rewrite inputs
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// URL the payload was loaded from; base for relative references
    pub target: Url,
    /// Callback for navigable pages, e.g. `http://proxy:8080/`
    pub page_endpoint: String,
    /// Callback for sub-resources, e.g. `http://proxy:8080/asset`
    pub asset_endpoint: String,
}

impl RewriteContext {
    /// `proxy_base` is `scheme://host[:port]` without a trailing slash.
    pub fn new(target: Url, proxy_base: &str) -> Self {
        let base = proxy_base.trim_end_matches('/');
        Self {
            target,
            page_endpoint: format!("{}{}", base, PAGE_PATH),
            asset_endpoint: format!("{}{}", base, ASSET_PATH),
        }
    }

    /// Proxied form of a page URL
    pub fn page_url(&self, absolute: &str) -> String {
        proxied(&self.page_endpoint, absolute)
    }

    /// Proxied form of an asset URL
    pub fn asset_url(&self, absolute: &str) -> String {
        proxied(&self.asset_endpoint, absolute)
    }
}

/// Payload families, selected by media type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Script,
    /// Other textual content, relayed verbatim
    Text,
    /// Served through the asset path only
    Binary,
}

impl ContentKind {
    pub fn from_mime(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "" | "text/html" | "application/xhtml+xml" => Self::Html,
            "text/css" => Self::Css,
            "text/javascript"
            | "application/javascript"
            | "application/x-javascript"
            | "application/ecmascript"
            | "text/ecmascript" => Self::Script,
            "image/svg+xml" => Self::Text,
            m if m.starts_with("text/") => Self::Text,
            "application/json" | "application/xml" | "application/ld+json" => Self::Text,
            m if m.ends_with("+json") || m.ends_with("+xml") => Self::Text,
            _ => Self::Binary,
        }
    }
}

/// Rewrite `payload` according to its kind. Text passes through.
pub fn rewrite(kind: ContentKind, payload: &str, ctx: &RewriteContext) -> String {
    match kind {
        ContentKind::Html => html::rewrite(payload, ctx),
        ContentKind::Css => css::rewrite(payload, ctx),
        ContentKind::Script => js::rewrite(payload, ctx),
        ContentKind::Text | ContentKind::Binary => payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_endpoints() {
        let ctx = RewriteContext::new(
            Url::parse("https://example.com/").unwrap(),
            "http://localhost:8080/",
        );
        assert_eq!(ctx.page_endpoint, "http://localhost:8080/");
        assert_eq!(ctx.asset_endpoint, "http://localhost:8080/asset");
        assert_eq!(
            ctx.asset_url("https://example.com/a.png"),
            "http://localhost:8080/asset?url=https%3A%2F%2Fexample.com%2Fa.png"
        );
    }

    #[test]
    fn test_content_kind_from_mime() {
        assert_eq!(ContentKind::from_mime("text/html; charset=utf-8"), ContentKind::Html);
        assert_eq!(ContentKind::from_mime(""), ContentKind::Html);
        assert_eq!(ContentKind::from_mime("TEXT/CSS"), ContentKind::Css);
        assert_eq!(
            ContentKind::from_mime("application/javascript"),
            ContentKind::Script
        );
        assert_eq!(ContentKind::from_mime("text/plain"), ContentKind::Text);
        assert_eq!(ContentKind::from_mime("application/json"), ContentKind::Text);
        assert_eq!(ContentKind::from_mime("image/png"), ContentKind::Binary);
        assert_eq!(ContentKind::from_mime("application/pdf"), ContentKind::Binary);
        assert_eq!(ContentKind::from_mime("font/woff2"), ContentKind::Binary);
    }

    #[test]
    fn test_text_passes_through() {
        let ctx = RewriteContext::new(
            Url::parse("https://example.com/").unwrap(),
            "http://localhost:8080",
        );
        let body = "see https://example.com/x";
        assert_eq!(rewrite(ContentKind::Text, body, &ctx), body);
    }
}
