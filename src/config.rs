//! Configuration management for the Deep Zoom server.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `DZ_` prefix
//! - Sensible defaults for every setting
//!
//! # Example
//!
//! ```ignore
//! use deep_zoom_server::config::Config;
//!
//! let config = Config::parse();
//! println!("Listening on {}", config.bind_address());
//! println!("Data directory: {}", config.data_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! - `DZ_HOST` - Server bind address (default: 0.0.0.0)
//! - `DZ_PORT` - Server port (default: 3000)
//! - `DZ_DATA_DIR` - Root of the uploads and tiles directories (default: data)
//! - `DZ_TILE_SIZE` - Default tile size in pixels (default: 512)
//! - `DZ_OVERLAP` - Tile overlap in pixels (default: 1)
//! - `DZ_MAX_UPLOAD_SIZE` - Upload limit in bytes (default: 500MB)
//! - `DZ_ENV` - `development` or `production` (default: development)
//! - `DZ_CORS_ORIGINS` - Comma-separated allowed origins (default: any)
//! - `DZ_CACHE_MAX_AGE` - Cache max-age for tile assets in seconds (default: 1 year)

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::tile::{DEFAULT_OVERLAP, DEFAULT_TILE_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default data directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default upload limit (500MB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 500 * 1024 * 1024;

/// Default cache max-age for tile assets (1 year).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 365 * 24 * 60 * 60;

/// Largest accepted tile size.
pub const MAX_TILE_SIZE: u32 = 8192;

// =============================================================================
// Environment
// =============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Whether internal error detail must be hidden from clients.
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Deep Zoom server - upload images and browse them as tile pyramids.
#[derive(Parser, Debug, Clone)]
#[command(name = "deep-zoom-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "DZ_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "DZ_PORT")]
    pub port: u16,

    /// Deployment environment.
    ///
    /// Production hides internal error details and the debug endpoints.
    #[arg(long, value_enum, default_value_t = Environment::Development, env = "DZ_ENV")]
    pub environment: Environment,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding `uploads/` and `tiles/`.
    #[arg(long, default_value = DEFAULT_DATA_DIR, env = "DZ_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Maximum accepted upload size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE, env = "DZ_MAX_UPLOAD_SIZE")]
    pub max_upload_size: u64,

    // =========================================================================
    // Tiling Configuration
    // =========================================================================
    /// Tile edge length in pixels.
    ///
    /// Images smaller than one tile are tiled with a reduced size.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "DZ_TILE_SIZE")]
    pub tile_size: u32,

    /// Overlap between neighbouring tiles in pixels.
    #[arg(long, default_value_t = DEFAULT_OVERLAP, env = "DZ_OVERLAP")]
    pub overlap: u32,

    /// HTTP Cache-Control max-age for tile assets in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "DZ_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "DZ_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(format!("tile_size must be between 1 and {}", MAX_TILE_SIZE));
        }

        if self.overlap >= self.tile_size {
            return Err("overlap must be smaller than tile_size".to_string());
        }

        if self.max_upload_size == 0 {
            return Err("max_upload_size must be greater than 0".to_string());
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err("Data directory is required. Set --data-dir or DZ_DATA_DIR".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
