//! Router configuration for the Deep Zoom server.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! static tile serving and request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /                                   - Viewer page
//! /view/{id}                          - Viewer page for a stored image
//! /health                             - Health check
//! /api/demo                           - Endpoint index
//! /api/images/upload                  - Upload (POST, multipart)
//! /api/images/{id}/manifest           - Pyramid geometry
//! /api/images/{id}/stats              - Disk usage
//! /api/images/{id}                    - Delete (DELETE)
//! /api/debug/{files,dzi}/{id}         - Diagnostics (not in production)
//! /tiles/...                          - Static pyramid assets
//! ```
//!
//! # Example
//!
//! ```ignore
//! use deep_zoom_server::server::routes::{create_router, RouterConfig};
//! use deep_zoom_server::storage::StorageLayout;
//! use deep_zoom_server::tile::{PyramidEngine, TilingService};
//!
//! let storage = StorageLayout::new("data");
//! let service = TilingService::new(PyramidEngine::new(), storage);
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::assets::tile_assets_router;
use super::handlers::{
    debug_files_handler, debug_manifest_handler, delete_handler, demo_handler, health_handler,
    manifest_handler, route_not_found, stats_handler, upload_handler, AppState,
};
use super::viewer::{index_handler, viewer_handler};
use crate::config::{Environment, DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_UPLOAD_SIZE};
use crate::tile::{TilingEngine, TilingService};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age for tile assets in seconds
    pub cache_max_age: u32,

    /// Upload limit in bytes
    pub max_upload_size: u64,

    /// Deployment environment
    pub environment: Environment,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tile assets are cacheable for one year
    /// - Uploads are limited to 500MB
    /// - Development environment (debug routes mounted)
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            environment: Environment::Development,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Set the upload limit in bytes.
    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `service` - The tiling service (owns the storage layout)
/// * `config` - Router configuration
pub fn create_router<E: TilingEngine>(service: TilingService<E>, config: RouterConfig) -> Router {
    let tiles_root = service.storage().tiles_root().to_path_buf();

    let app_state = AppState::new(service)
        .with_max_upload_size(config.max_upload_size)
        .with_environment(config.environment);

    let mut api_routes = Router::new()
        .route("/", get(index_handler))
        .route("/view/{id}", get(viewer_handler::<E>))
        .route("/health", get(health_handler::<E>))
        .route("/api/demo", get(demo_handler::<E>))
        // The handler enforces the configured limit while streaming
        .route(
            "/api/images/upload",
            post(upload_handler::<E>).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/images/{id}/manifest", get(manifest_handler::<E>))
        .route("/api/images/{id}/stats", get(stats_handler::<E>))
        .route("/api/images/{id}", delete(delete_handler::<E>));

    if !config.environment.is_production() {
        api_routes = api_routes
            .route("/api/debug/files/{id}", get(debug_files_handler::<E>))
            .route("/api/debug/dzi/{id}", get(debug_manifest_handler::<E>));
    }

    let router = api_routes
        .with_state(app_state)
        .nest_service(
            "/tiles",
            tile_assets_router(tiles_root, config.cache_max_age),
        )
        .fallback(route_not_found)
        .layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
