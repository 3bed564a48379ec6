//! # Deep Zoom Server
//!
//! An image upload service that turns PNG, JPEG and TIFF images into Deep
//! Zoom (DZI) tile pyramids and serves them to a browser viewer.
//!
//! ## Features
//!
//! - **Multipart upload**: size and type checks while streaming, dimension checks after
//! - **Pyramid tiling**: recursive halving into overlapping PNG tiles
//! - **Derived geometry**: level counts are recomputed from the manifest on every read
//! - **Static tile serving**: long-lived cache headers on manifests and tiles
//! - **Built-in web viewer**: OpenSeadragon-based upload and viewing page
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`storage`] - Image ids and the on-disk layout of uploads and tiles
//! - [`tile`] - Tiling engine, DZI manifests and the tiling service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```rust,no_run
//! use deep_zoom_server::{create_router, PyramidEngine, RouterConfig, StorageLayout, TilingService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = StorageLayout::new("data");
//!     storage.ensure_base_dirs().await.unwrap();
//!
//!     let service = TilingService::new(PyramidEngine::new(), storage);
//!     let router = create_router(service, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod storage;
pub mod tile;

// Re-export commonly used types
pub use config::{Config, Environment};
pub use error::{ImageValidationError, ManifestError, StorageError, TilingError, UploadError};
pub use server::{create_router, ApiError, AppState, ErrorResponse, RouterConfig};
pub use storage::{FileEntry, ImageId, ImageSize, StorageLayout};
pub use tile::{
    pyramid_levels, ImageMetadata, Manifest, PyramidEngine, PyramidSummary, TileInfo,
    TilingEngine, TilingEstimate, TilingOptions, TilingService,
};
