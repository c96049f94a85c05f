//! Script rewriting
//!
//! Only quoted absolute or protocol-relative literals are touched. A
//! root-relative string in a script is as likely to be a route fragment or
//! a regex as a URL, so those are left alone.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::{resolve, RewriteContext};

static URL_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""((?i:https?:)?//[^"\s\\]+)"|'((?i:https?:)?//[^'\s\\]+)'|`((?i:https?:)?//[^`\s\\$]+)`"#,
    )
    .expect("valid literal pattern")
});

/// Rewrite URL string literals in a script to the page endpoint.
pub fn rewrite(payload: &str, ctx: &RewriteContext) -> String {
    if payload.is_empty() {
        return String::new();
    }

    URL_LITERAL
        .replace_all(payload, |caps: &Captures| {
            let (m, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => (m, '"'),
                (_, Some(m), _) => (m, '\''),
                (_, _, Some(m)) => (m, '`'),
                _ => return caps[0].to_string(),
            };

            match resolve(m.as_str(), &ctx.target) {
                Ok(absolute) => format!("{quote}{}{quote}", ctx.page_url(&absolute)),
                Err(e) => {
                    debug!(literal = m.as_str(), error = %e, "Leaving literal unrewritten");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> RewriteContext {
        RewriteContext::new(
            Url::parse("https://example.com/app.js").unwrap(),
            "http://proxy.local:8080",
        )
    }

    #[test]
    fn test_quoted_absolute_literals() {
        let js = r#"fetch("https://api.example.com/v1/items"); var a = 'http://x.example/y';"#;
        let out = rewrite(js, &ctx());

        assert!(out.contains(&format!(
            r#"fetch("{}")"#,
            ctx().page_url("https://api.example.com/v1/items")
        )));
        assert!(out.contains(&format!("'{}'", ctx().page_url("http://x.example/y"))));
    }

    #[test]
    fn test_protocol_relative_and_template_literals() {
        let js = "load(`//cdn.example.net/chunk.js`);";
        let out = rewrite(js, &ctx());
        assert_eq!(
            out,
            format!("load(`{}`);", ctx().page_url("https://cdn.example.net/chunk.js"))
        );
    }

    #[test]
    fn test_root_relative_literals_untouched() {
        let js = r#"router.push("/dashboard"); const re = '/api/';"#;
        assert_eq!(rewrite(js, &ctx()), js);
    }

    #[test]
    fn test_interpolated_and_unquoted_untouched() {
        let js = "const u = `https://${host}/x`; // https://example.com/comment";
        assert_eq!(rewrite(js, &ctx()), js);
    }

    #[test]
    fn test_escaped_and_malformed_literals_untouched() {
        let js = r#"var a = "https:\/\/example.com\/x"; var b = "http://[::1";"#;
        assert_eq!(rewrite(js, &ctx()), js);
    }
}
