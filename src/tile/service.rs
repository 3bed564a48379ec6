//! Tiling service: validates images, drives the engine, writes the manifest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TilingService                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                       tile()                            │    │
//! │  │  1. Read dimensions    4. Verify tile tree exists       │    │
//! │  │  2. Adjust tile size   5. Write manifest (last)         │    │
//! │  │  3. Run engine         6. Verify + parse manifest       │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │               │                                │                │
//! │               ▼                                ▼                │
//! │       ┌───────────────┐               ┌────────────────┐        │
//! │       │ TilingEngine  │               │ StorageLayout  │        │
//! │       └───────────────┘               └────────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The manifest is the last artifact written; its presence on disk is the
//! signal that tiling finished completely.

use std::path::Path;

use image::{ImageFormat, ImageReader};
use serde::Serialize;
use tracing::{debug, info};

use super::engine::TilingEngine;
use super::manifest::{pyramid_levels, Manifest, TileInfo};
use crate::error::{ImageValidationError, ManifestError, TilingError};
use crate::storage::{ImageId, StorageLayout};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Default overlap between neighbouring tiles in pixels.
pub const DEFAULT_OVERLAP: u32 = 1;

/// Upper bound of the tile size used for images smaller than one tile.
pub const SMALL_IMAGE_TILE_SIZE: u32 = 256;

/// Smallest accepted width or height.
pub const MIN_IMAGE_DIMENSION: u32 = 100;

/// Largest accepted width or height.
pub const MAX_IMAGE_DIMENSION: u32 = 50_000;

// =============================================================================
// Options and results
// =============================================================================

/// Parameters passed to the tiling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingOptions {
    pub tile_size: u32,
    pub overlap: u32,
}

impl Default for TilingOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Decoded header information of a source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Detected format name, e.g. `png`, `jpeg`, `tiff`
    pub format: String,
    /// File size in bytes
    pub size: u64,
}

/// Rough cost of tiling an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingEstimate {
    pub total_tiles: u64,
    pub estimated_seconds: u64,
}

/// Tile size actually used for an image.
///
/// When the larger side is smaller than the configured tile size the
/// pyramid would be one oversized tile, so the tile size shrinks to
/// `min(256, max_dimension)`.
pub fn adjust_tile_size(tile_size: u32, width: u32, height: u32) -> u32 {
    let max_dimension = width.max(height);
    if max_dimension < tile_size {
        SMALL_IMAGE_TILE_SIZE.min(max_dimension)
    } else {
        tile_size
    }
}

/// Check decoded dimensions against the accepted range.
pub fn check_dimensions(width: u32, height: u32) -> Result<(), ImageValidationError> {
    if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
        return Err(ImageValidationError::TooSmall {
            width,
            height,
            min: MIN_IMAGE_DIMENSION,
        });
    }

    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(ImageValidationError::TooLarge {
            width,
            height,
            max: MAX_IMAGE_DIMENSION,
        });
    }

    Ok(())
}

// =============================================================================
// Tiling Service
// =============================================================================

/// Orchestrates validation, tiling and manifest handling for stored images.
///
/// # Type Parameters
///
/// * `E` - The tiling engine (e.g. [`PyramidEngine`](super::PyramidEngine))
pub struct TilingService<E: TilingEngine> {
    engine: E,
    storage: StorageLayout,
    options: TilingOptions,
}

impl<E: TilingEngine> TilingService<E> {
    /// Create a service with default tiling options.
    pub fn new(engine: E, storage: StorageLayout) -> Self {
        Self::with_options(engine, storage, TilingOptions::default())
    }

    /// Create a service with custom default tiling options.
    pub fn with_options(engine: E, storage: StorageLayout, options: TilingOptions) -> Self {
        Self {
            engine,
            storage,
            options,
        }
    }

    /// The storage layout this service writes into.
    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    /// Default tiling options.
    pub fn options(&self) -> TilingOptions {
        self.options
    }

    /// Read and check the dimensions of the image at `path`.
    pub async fn validate(&self, path: &Path) -> Result<ImageMetadata, ImageValidationError> {
        let (width, height, format) = probe(path)
            .await
            .map_err(|e| ImageValidationError::Unreadable(e.to_string()))?;

        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| ImageValidationError::Unreadable(e.to_string()))?
            .len();

        check_dimensions(width, height)?;

        Ok(ImageMetadata {
            width,
            height,
            format: format.map(format_name).unwrap_or("unknown").to_string(),
            size,
        })
    }

    /// Tile the image at `source` into the tile tree of `id`.
    ///
    /// `options` overrides the service defaults for this call. The manifest
    /// is computed from the known geometry, never from engine output, and is
    /// verified on disk before returning.
    pub async fn tile(
        &self,
        source: &Path,
        id: &ImageId,
        options: Option<TilingOptions>,
    ) -> Result<TileInfo, TilingError> {
        let options = options.unwrap_or(self.options);

        let (width, height, _) = probe(source)
            .await
            .map_err(|e| TilingError::InvalidImage(e.to_string()))?;

        let tile_size = adjust_tile_size(options.tile_size, width, height);
        if tile_size != options.tile_size {
            info!(
                image_id = %id,
                width,
                height,
                "Adjusted tile size from {} to {} for small image",
                options.tile_size,
                tile_size
            );
        }

        let tile_root = self.storage.tile_tree_root(id);
        tokio::fs::create_dir_all(&tile_root).await.map_err(|e| {
            TilingError::Engine(format!("failed to create {}: {}", tile_root.display(), e))
        })?;

        let summary = self
            .engine
            .tile(source, &self.storage.tile_base(id), tile_size, options.overlap)
            .await?;
        debug!(
            image_id = %id,
            levels = summary.levels,
            tiles = summary.tiles,
            "Engine finished"
        );

        let files_dir = self.storage.tile_files_dir(id);
        if !is_dir(&files_dir).await {
            return Err(TilingError::NoTiles { path: files_dir });
        }

        let manifest = Manifest::for_image(id, width, height, tile_size, options.overlap);
        let manifest_path = self.storage.manifest_path(id);
        tokio::fs::write(&manifest_path, manifest.to_xml())
            .await
            .map_err(|source| TilingError::ManifestWrite {
                path: manifest_path.clone(),
                source,
            })?;

        if !tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            return Err(TilingError::ManifestMissing {
                path: manifest_path,
            });
        }

        let written = self.read_manifest(id).await?;
        Ok(written.tile_info(&manifest_path))
    }

    /// Read and parse the persisted manifest of `id`.
    pub async fn read_manifest(&self, id: &ImageId) -> Result<Manifest, ManifestError> {
        let xml = tokio::fs::read_to_string(self.storage.manifest_path(id)).await?;
        Manifest::parse(&xml)
    }

    /// Estimate tile count and duration at the default tile size.
    pub fn estimate(&self, width: u32, height: u32) -> TilingEstimate {
        let tile_size = u64::from(self.options.tile_size.max(1));
        let levels = pyramid_levels(width, height, self.options.tile_size);

        let total_tiles = (0..levels.min(63))
            .map(|level| {
                let scale = 1u64 << level;
                let level_width = u64::from(width).div_ceil(scale);
                let level_height = u64::from(height).div_ceil(scale);
                level_width.div_ceil(tile_size) * level_height.div_ceil(tile_size)
            })
            .sum::<u64>();

        TilingEstimate {
            total_tiles,
            estimated_seconds: total_tiles.div_ceil(100).max(5),
        }
    }
}

/// Read dimensions and format from the image header without decoding pixels.
async fn probe(path: &Path) -> Result<(u32, u32, Option<ImageFormat>), image::ImageError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let reader = ImageReader::open(&path)?.with_guessed_format()?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions()?;
        Ok((width, height, format))
    })
    .await
    .map_err(|e| image::ImageError::IoError(std::io::Error::other(e)))?
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Tiff => "tiff",
        other => other.extensions_str().first().copied().unwrap_or("unknown"),
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
