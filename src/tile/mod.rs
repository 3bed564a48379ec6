//! Tiling layer.
//!
//! Turns a stored source image into a Deep Zoom pyramid plus manifest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             TilingService               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ TilingEngine │  │    Manifest     │  │
//! │  │  (pyramid    │  │  (DZI XML +     │  │
//! │  │   on disk)   │  │   level math)   │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             StorageLayout               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TilingService`]: validates images, runs the engine, writes and reads manifests
//! - [`TilingEngine`]: capability that writes `<base>_files/<level>/<x>_<y>.png`
//! - [`PyramidEngine`]: default engine built on the `image` crate
//! - [`Manifest`]: DZI manifest writer/parser
//! - [`TileInfo`]: pyramid geometry derived from a manifest
//!
//! # Example
//!
//! ```
//! use deep_zoom_server::tile::{pyramid_levels, TileInfo};
//! use std::path::Path;
//!
//! assert_eq!(pyramid_levels(1024, 768, 512), 2);
//!
//! let info = TileInfo::derive(1024, 768, 512, Path::new("data/tiles/x/x.dzi"));
//! assert_eq!(info.max_level, 1);
//! ```

mod engine;
mod manifest;
mod service;

pub use engine::{
    decode_limits, decode_source, pyramid_dir, PyramidEngine, PyramidSummary, TilingEngine,
};
pub use manifest::{
    dzi_level_dimensions, dzi_tile_count, max_dzi_level, parse_tile_file_name, pyramid_levels,
    tile_bounds, Manifest, TileInfo, DEEPZOOM_NAMESPACE, TILE_FORMAT,
};
pub use service::{
    adjust_tile_size, check_dimensions, ImageMetadata, TilingEstimate, TilingOptions,
    TilingService, DEFAULT_OVERLAP, DEFAULT_TILE_SIZE, MAX_IMAGE_DIMENSION, MIN_IMAGE_DIMENSION,
    SMALL_IMAGE_TILE_SIZE,
};
