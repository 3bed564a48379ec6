//! Static serving of tile pyramids under `/tiles`.
//!
//! ```text
//! /tiles/{id}/{id}.dzi                      -> tiles/{id}/{id}.dzi
//! /tiles/{id}/{id}_files/{level}/{x}_{y}.png -> tiles/{id}/{id}_files/{level}/{x}_{y}.png
//! /tiles/{id}/{level}/{x}_{y}.png           -> tiles/{id}/{id}_files/{level}/{x}_{y}.png
//! ```
//!
//! Files are served by [`ServeDir`]; a middleware in front of it resolves
//! the short tile form and stamps caching headers on successful responses.

use std::path::PathBuf;

use axum::{
    extract::{Request, State},
    handler::HandlerWithoutStateExt,
    http::{header, HeaderValue, Uri},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower_http::services::ServeDir;
use tracing::debug;

use super::handlers::ApiError;
use crate::storage::ImageId;
use crate::tile::parse_tile_file_name;

/// Build the router mounted at `/tiles`.
pub fn tile_assets_router(tiles_root: PathBuf, cache_max_age: u32) -> Router {
    let serve_dir = ServeDir::new(tiles_root)
        .append_index_html_on_directories(false)
        .not_found_service(asset_not_found.into_service());

    Router::new()
        .fallback_service(serve_dir)
        .layer(middleware::from_fn_with_state(
            cache_max_age,
            tile_asset_middleware,
        ))
}

async fn asset_not_found() -> ApiError {
    ApiError::NotFound("File not found".to_string())
}

/// Rewrite short tile paths and add cache headers to served assets.
pub async fn tile_asset_middleware(
    State(cache_max_age): State<u32>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(rewritten) = resolve_tile_alias(request.uri().path()) {
        match rewritten.parse::<Uri>() {
            Ok(uri) => {
                debug!(from = %request.uri(), to = %uri, "Resolved tile alias");
                *request.uri_mut() = uri;
            }
            Err(e) => debug!("Ignoring unparseable tile alias {}: {}", rewritten, e),
        }
    }

    let is_manifest = request.uri().path().ends_with(".dzi");
    let mut response = next.run(request).await;

    if response.status().is_success() {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", cache_max_age)) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if is_manifest {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/xml"),
            );
        }
    }

    response
}

/// Map `/{id}/{level}/{x}_{y}.png` to its location inside the DZI tree.
///
/// Returns `None` for every other path, which is then served as-is.
pub fn resolve_tile_alias(path: &str) -> Option<String> {
    let mut segments = path.trim_start_matches('/').split('/');
    let (raw_id, level, file) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let id = ImageId::parse(raw_id)?;
    let level: u32 = level.parse().ok()?;
    let (x, y) = parse_tile_file_name(file)?;

    Some(format!("/{id}/{id}_files/{level}/{x}_{y}.png"))
}
