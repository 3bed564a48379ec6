//! Pyramid tiling engine.
//!
//! The engine is a capability: given a source image, an output stem, a tile
//! size and an overlap, it materialises a Deep Zoom tile tree on disk:
//!
//! ```text
//! <output_base>_files/
//! ├── 0/0_0.png            (1x1-ish, lowest resolution)
//! ├── 1/0_0.png
//! ├── ...
//! └── <max_level>/<x>_<y>.png   (full resolution)
//! ```
//!
//! It does not write a manifest; that is the tiling service's job, so any
//! conforming engine can be substituted without changing the manifest.
//!
//! # Design Decisions
//!
//! - **Recursive halving**: each level is resized from the level above it
//!   rather than from the source, which keeps large pyramids cheap.
//!
//! - **PNG output**: tiles are always PNG regardless of the source format.
//!   Floating point sources are converted to 8-bit RGBA first.
//!
//! - **Decode limits**: only the per-side dimension bound is enforced when
//!   decoding; there is no cap on the decoded buffer size.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use tracing::debug;

use super::manifest::{dzi_level_dimensions, dzi_tile_count, max_dzi_level, tile_bounds};
use super::service::MAX_IMAGE_DIMENSION;
use crate::error::TilingError;

// =============================================================================
// Engine Trait
// =============================================================================

/// Summary of a generated pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidSummary {
    /// Number of Deep Zoom levels written (`max_level + 1`)
    pub levels: u32,

    /// Number of tile files written
    pub tiles: u64,
}

/// Something that can cut an image into a Deep Zoom pyramid.
#[async_trait]
pub trait TilingEngine: Send + Sync + 'static {
    /// Write the pyramid of `source` under `<output_base>_files/`.
    async fn tile(
        &self,
        source: &Path,
        output_base: &Path,
        tile_size: u32,
        overlap: u32,
    ) -> Result<PyramidSummary, TilingError>;
}

/// Directory the pyramid of `output_base` lives in.
pub fn pyramid_dir(output_base: &Path) -> Option<PathBuf> {
    let mut name: OsString = output_base.file_name()?.to_os_string();
    name.push("_files");
    Some(output_base.with_file_name(name))
}

// =============================================================================
// Image-crate engine
// =============================================================================

/// Tiling engine backed by the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct PyramidEngine {
    filter: FilterType,
}

impl Default for PyramidEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PyramidEngine {
    /// Create an engine using triangle (bilinear) downsampling.
    pub fn new() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }

    /// Create an engine using a specific resampling filter.
    pub fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Build the pyramid synchronously. Blocks on decoding and encoding.
    pub fn build_pyramid(
        &self,
        source: &Path,
        output_base: &Path,
        tile_size: u32,
        overlap: u32,
    ) -> Result<PyramidSummary, TilingError> {
        if tile_size == 0 {
            return Err(TilingError::Engine("tile size must be positive".to_string()));
        }

        let files_dir = pyramid_dir(output_base).ok_or_else(|| {
            TilingError::Engine(format!("invalid output path {}", output_base.display()))
        })?;

        let image = normalize_for_png(decode_source(source)?);

        let (width, height) = image.dimensions();
        let max_level = max_dzi_level(width, height);
        let mut tiles = 0u64;

        debug!(
            width,
            height, max_level, tile_size, overlap, "Building Deep Zoom pyramid"
        );

        // Walk from full resolution down, halving the previous level each time.
        let mut current = image;
        for level in (0..=max_level).rev() {
            let (level_width, level_height) = dzi_level_dimensions(width, height, level, max_level);
            if current.dimensions() != (level_width, level_height) {
                current = current.resize_exact(level_width, level_height, self.filter);
            }

            let level_dir = files_dir.join(level.to_string());
            tiles += write_level(&current, &level_dir, tile_size, overlap)?;
        }

        Ok(PyramidSummary {
            levels: max_level + 1,
            tiles,
        })
    }
}

#[async_trait]
impl TilingEngine for PyramidEngine {
    async fn tile(
        &self,
        source: &Path,
        output_base: &Path,
        tile_size: u32,
        overlap: u32,
    ) -> Result<PyramidSummary, TilingError> {
        let engine = *self;
        let source = source.to_path_buf();
        let output_base = output_base.to_path_buf();

        tokio::task::spawn_blocking(move || {
            engine.build_pyramid(&source, &output_base, tile_size, overlap)
        })
        .await
        .map_err(|e| TilingError::Engine(format!("tiling task failed: {}", e)))?
    }
}

/// Decoder limits for source images.
///
/// The allocation cap of the `image` crate (512 MiB) would reject images well
/// inside the accepted dimension range, so only the per-side bound applies.
pub fn decode_limits() -> Limits {
    let mut limits = Limits::no_limits();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits
}

/// Fully decode the source image with [`decode_limits`].
pub fn decode_source(source: &Path) -> Result<DynamicImage, TilingError> {
    let mut reader = ImageReader::open(source)
        .map_err(|e| TilingError::InvalidImage(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| TilingError::InvalidImage(e.to_string()))?;
    reader.limits(decode_limits());

    reader
        .decode()
        .map_err(|e| TilingError::InvalidImage(e.to_string()))
}

/// Write every tile of one level, returning the number of tiles written.
fn write_level(
    image: &DynamicImage,
    level_dir: &Path,
    tile_size: u32,
    overlap: u32,
) -> Result<u64, TilingError> {
    std::fs::create_dir_all(level_dir).map_err(|e| {
        TilingError::Engine(format!("failed to create {}: {}", level_dir.display(), e))
    })?;

    let (level_width, level_height) = image.dimensions();
    let (tiles_x, tiles_y) = dzi_tile_count(level_width, level_height, tile_size);

    for row in 0..tiles_y {
        for col in 0..tiles_x {
            let (x, y, w, h) = tile_bounds(level_width, level_height, col, row, tile_size, overlap);
            let path = level_dir.join(format!("{}_{}.png", col, row));

            image
                .crop_imm(x, y, w, h)
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| {
                    TilingError::Engine(format!("failed to write {}: {}", path.display(), e))
                })?;
        }
    }

    Ok(u64::from(tiles_x) * u64::from(tiles_y))
}

/// PNG cannot hold floating point samples; everything else passes through.
fn normalize_for_png(image: DynamicImage) -> DynamicImage {
    match image.color() {
        ColorType::Rgb32F | ColorType::Rgba32F => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => image,
    }
}

// =============================================================================
// Tests
// =============================================================================
