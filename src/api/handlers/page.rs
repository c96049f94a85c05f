//! Page relay: render, rewrite, return

use axum::extract::{RawQuery, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::api::proxy_base::ProxyBase;
use crate::api::server::AppState;
use crate::error::MirageError;
use crate::rewrite::{self, ContentKind, RewriteContext, ASSET_PATH};

use super::target_param;

/// `/?url=<target>`
pub async fn proxy_page(
    State(state): State<AppState>,
    method: Method,
    base: Result<ProxyBase, MirageError>,
    RawQuery(query): RawQuery,
) -> Result<Response, MirageError> {
    if method != Method::GET {
        return Err(MirageError::MethodNotAllowed(method.to_string()));
    }
    let base = base?;
    let target = target_param(query.as_deref())?;

    info!(url = %target, "Proxying page");

    let page = state.controller.fetch(&target).await.map_err(|e| {
        warn!(url = %target, error = %e, "Page fetch failed");
        e
    })?;

    let content_type = page.content_type().await;
    let kind = ContentKind::from_mime(&content_type);

    if kind == ContentKind::Binary {
        let location = rewrite::proxied(
            &format!("{}{}", base, ASSET_PATH),
            page.final_url.as_str(),
        );
        page.close().await;
        info!(url = %target, content_type = %content_type, "Redirecting binary page to asset path");
        return Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response());
    }

    let content = page.content().await;
    let final_url = page.final_url.clone();
    page.close().await;
    let content = content?;

    let ctx = RewriteContext::new(final_url, base.as_str());
    let body = rewrite::rewrite(kind, &content, &ctx);

    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}
