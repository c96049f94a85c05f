//! Asset relay: raw bytes through a TTL cache

use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::api::server::AppState;
use crate::error::MirageError;

use super::target_param;

/// `/asset?url=<target>`
pub async fn proxy_asset(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, MirageError> {
    let target = target_param(query.as_deref())?;

    if let Some(hit) = state.assets.get(target.as_str()) {
        debug!(url = %target, "Asset cache hit");
        return Ok(asset_response(hit.content_type, hit.body));
    }

    let fetched = state.asset_fetcher.fetch(&target).await.map_err(|e| {
        warn!(url = %target, error = %e, "Asset fetch failed");
        e
    })?;

    state
        .assets
        .put(target.as_str(), fetched.body.clone(), &fetched.content_type);

    Ok(asset_response(fetched.content_type, fetched.body))
}

fn asset_response(content_type: String, body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}
