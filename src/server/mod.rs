//! HTTP server layer for the Deep Zoom server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /api/images/upload      GET /tiles/{id}/{id}.dzi      │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌────────┐  │
//! │  │  handlers   │  │   assets    │  │   viewer    │  │ routes │  │
//! │  │ (JSON API)  │  │ (static     │  │ (HTML page) │  │        │  │
//! │  │             │  │  tiles)     │  │             │  │        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod assets;
pub mod handlers;
pub mod routes;
pub mod viewer;

pub use assets::{resolve_tile_alias, tile_assets_router};
pub use handlers::{
    check_mime_type, delete_handler, health_handler, manifest_handler, stats_handler,
    upload_handler, ApiError, AppState, ErrorResponse, HealthResponse, ImageResponse,
    StatsResponse, ALLOWED_MIME_TYPES,
};
pub use routes::{create_router, RouterConfig};
pub use viewer::generate_viewer_html;
