//! Request handlers

pub mod asset;
pub mod health;
pub mod page;

use url::{form_urlencoded, Url};

use crate::error::{MirageError, Result};
use crate::rewrite::validate_target;

/// The `url` query parameter as a validated absolute http(s) URL
pub(crate) fn target_param(raw_query: Option<&str>) -> Result<Url> {
    let raw = raw_query
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "url")
                .map(|(_, value)| value.into_owned())
        })
        .ok_or_else(|| MirageError::InvalidRequest("missing url parameter".into()))?;

    validate_target(&raw)
}
