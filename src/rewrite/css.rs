//! Stylesheet rewriting: `url(...)` references only

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::{resolve, RewriteContext};

static URL_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^"'\s)][^)]*?))\s*\)"#)
        .expect("valid url() pattern")
});

/// Rewrite every `url(...)` in a stylesheet to the asset endpoint.
pub fn rewrite(payload: &str, ctx: &RewriteContext) -> String {
    if payload.is_empty() {
        return String::new();
    }

    URL_FUNCTION
        .replace_all(payload, |caps: &Captures| rewrite_one(caps, ctx))
        .into_owned()
}

fn rewrite_one(caps: &Captures, ctx: &RewriteContext) -> String {
    let original = caps[0].to_string();

    let (reference, quote) = if let Some(m) = caps.get(1) {
        (m.as_str(), "\"")
    } else if let Some(m) = caps.get(2) {
        (m.as_str(), "'")
    } else if let Some(m) = caps.get(3) {
        (m.as_str(), "")
    } else {
        return original;
    };

    let trimmed = reference.trim();
    if trimmed.is_empty() || is_passthrough(trimmed) {
        return original;
    }

    match resolve(trimmed, &ctx.target) {
        Ok(absolute) => format!("url({quote}{}{quote})", ctx.asset_url(&absolute)),
        Err(e) => {
            debug!(reference = trimmed, error = %e, "Leaving url() unrewritten");
            original
        }
    }
}

// data: payloads are inline; `#id` points into the current document (SVG filters, masks).
fn is_passthrough(reference: &str) -> bool {
    let lower = reference.get(..5).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("data:") || reference.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> RewriteContext {
        RewriteContext::new(
            Url::parse("https://example.com/static/css/site.css").unwrap(),
            "http://proxy.local:8080",
        )
    }

    fn asset(absolute: &str) -> String {
        ctx().asset_url(absolute)
    }

    #[test]
    fn test_data_url_is_byte_for_byte_unchanged() {
        let css = ".icon { background: url(data:image/png;base64,iVBORw0KGgo/AAA+bbb=); }\n\
                   .x { mask: url( 'DATA:image/svg+xml;utf8,<svg/>' ) }";
        assert_eq!(rewrite(css, &ctx()), css);
    }

    #[test]
    fn test_all_reference_forms_resolve_to_asset_endpoint() {
        let css = r#"a{background:url("https://cdn.example.net/a.png")}
b{background:url('//cdn.example.net/b.png')}
c{background:url(/img/c.png)}
d{background:url(../fonts/d.woff2)}"#;
        let out = rewrite(css, &ctx());

        assert!(out.contains(&format!(r#"url("{}")"#, asset("https://cdn.example.net/a.png"))));
        assert!(out.contains(&format!("url('{}')", asset("https://cdn.example.net/b.png"))));
        assert!(out.contains(&format!("url({})", asset("https://example.com/img/c.png"))));
        assert!(out.contains(&format!(
            "url({})",
            asset("https://example.com/static/fonts/d.woff2")
        )));
    }

    #[test]
    fn test_whitespace_inside_parens_is_tolerated() {
        let out = rewrite("a{src:url(  /x.svg  )}", &ctx());
        assert_eq!(out, format!("a{{src:url({})}}", asset("https://example.com/x.svg")));
    }

    #[test]
    fn test_fragment_and_empty_references_untouched() {
        let css = "a{filter:url(#blur)} b{background:url()} c{background:url('')}";
        assert_eq!(rewrite(css, &ctx()), css);
    }

    #[test]
    fn test_malformed_reference_left_verbatim() {
        let css = "a{background:url(http://[::1/x.png)} b{background:url(/ok.png)}";
        let out = rewrite(css, &ctx());
        assert!(out.contains("url(http://[::1/x.png)"));
        assert!(out.contains(&asset("https://example.com/ok.png")));
    }

    #[test]
    fn test_non_url_content_untouched() {
        let css = "body { color: red; } /* see https://example.com/docs */";
        assert_eq!(rewrite(css, &ctx()), css);
        assert_eq!(rewrite("", &ctx()), "");
    }
}
