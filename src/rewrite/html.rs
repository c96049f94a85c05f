//! HTML rewriting
//!
//! Not attribute-aware: any absolute, protocol-relative or root-relative
//! URL that sits after a quote, `=`, `(` or whitespace is rewritten, so
//! path-like prose can be rewritten too. Absolute URLs directly inside
//! element text (after `>`) are rewritten as well. Anything inside a
//! `data:` value is passed through verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{intercept, resolve, RewriteContext};

static CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i:https?:)?//[^\s"'<>()\\]+|/[^\s"'<>()\\]*"#).expect("valid URL pattern")
});

static DATA_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)["'=]data:"#).expect("valid data pattern"));

static AMPERSAND_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)&(?:amp|#38|#x26);").expect("valid entity pattern"));

static RAW_TEXT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^<(?:script|style)[\s>]").expect("valid tag pattern"));

static BASE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<base[\s/>]").expect("valid base pattern"));

static HEAD_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<head(?:\s[^>]*)?>").expect("valid head pattern"));

static HEAD_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</head\s*>").expect("valid head pattern"));

/// Rewrite an HTML document for delivery through the proxy.
pub fn rewrite(payload: &str, ctx: &RewriteContext) -> String {
    if payload.is_empty() {
        return String::new();
    }

    let rewritten = rewrite_references(payload, ctx);
    let with_base = inject_base(rewritten, ctx);
    inject_intercept(with_base, ctx)
}

fn rewrite_references(payload: &str, ctx: &RewriteContext) -> String {
    let mut out = String::with_capacity(payload.len() + payload.len() / 4);
    let mut last = 0;
    let data_spans = data_spans(payload);

    for m in CANDIDATE.find_iter(payload) {
        if !in_rewritable_position(payload, m.start(), m.end()) {
            continue;
        }
        if data_spans
            .iter()
            .any(|&(start, end)| m.start() > start && m.start() < end)
        {
            continue;
        }

        // Serialized markup escapes `&` inside attribute values.
        let reference = AMPERSAND_ENTITY.replace_all(m.as_str(), "&");

        match resolve(&reference, &ctx.target) {
            Ok(absolute) => {
                out.push_str(&payload[last..m.start()]);
                out.push_str(&ctx.page_url(&absolute));
                last = m.end();
            }
            Err(e) => {
                debug!(reference = m.as_str(), error = %e, "Leaving reference unrewritten");
            }
        }
    }

    out.push_str(&payload[last..]);
    out
}

/// Byte ranges of `data:` values, each running from its opening quote (or
/// `=`) to the matching close.
fn data_spans(payload: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut covered = 0;

    for m in DATA_VALUE.find_iter(payload) {
        if m.start() < covered {
            continue;
        }

        let rest = &payload[m.end()..];
        let close = match &payload[m.start()..m.start() + 1] {
            "=" => rest.find(|c: char| c.is_whitespace() || c == '>'),
            quote => rest.find(quote),
        };
        let end = close.map_or(payload.len(), |i| m.end() + i);

        spans.push((m.start(), end));
        covered = end;
    }

    spans
}

fn in_rewritable_position(payload: &str, start: usize, end: usize) -> bool {
    let lead_ok = match payload[..start].chars().next_back() {
        None => true,
        Some('>') => is_element_text_url(payload, start),
        Some(c) => matches!(c, '"' | '\'' | '=' | '(') || c.is_whitespace(),
    };
    if !lead_ok {
        return false;
    }

    // A lone "/" only counts when it is a whole quoted value, which keeps
    // self-closing tags like `<br />` intact.
    if end - start == 1 {
        return matches!(payload[end..].chars().next(), Some('"' | '\''));
    }

    true
}

/// Only absolute and protocol-relative URLs count directly after `>`, and
/// a leading `//` straight after `<script>` or `<style>` is a comment.
fn is_element_text_url(payload: &str, start: usize) -> bool {
    let candidate = &payload[start..];
    if !candidate.starts_with("//") {
        return !candidate.starts_with('/');
    }

    let tag_start = payload[..start].rfind('<').unwrap_or(0);
    !RAW_TEXT_OPEN.is_match(&payload[tag_start..start])
}

fn inject_base(html: String, ctx: &RewriteContext) -> String {
    if BASE_TAG.is_match(&html) {
        return html;
    }

    let Some(head) = HEAD_OPEN.find(&html) else {
        return html;
    };

    let tag = format!(r#"<base href="{}">"#, ctx.page_url(ctx.target.as_str()));
    let mut out = String::with_capacity(html.len() + tag.len());
    out.push_str(&html[..head.end()]);
    out.push_str(&tag);
    out.push_str(&html[head.end()..]);
    out
}

fn inject_intercept(html: String, ctx: &RewriteContext) -> String {
    let Some(close) = HEAD_CLOSE.find(&html) else {
        return html;
    };

    let script = intercept::script(ctx);
    let mut out = String::with_capacity(html.len() + script.len());
    out.push_str(&html[..close.start()]);
    out.push_str(&script);
    out.push_str(&html[close.start()..]);
    out
}
