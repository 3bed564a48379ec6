//! Deep Zoom Image (DZI) manifest and pyramid geometry.
//!
//! The manifest is written by this crate, never taken from the tiling
//! engine, so swapping engines cannot change its schema:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
//!        Url="<id>_files/"
//!        Format="png"
//!        Overlap="1"
//!        TileSize="512"
//!        Width="1024"
//!        Height="768">
//! </Image>
//! ```
//!
//! # Level numbering
//!
//! Deep Zoom level 0 is the lowest resolution and every following level
//! doubles the linear resolution, up to `ceil(log2(max(width, height)))`
//! which is the full-resolution level. That is the layout of the tile tree
//! on disk. The `levels` figure reported through the API is a different,
//! coarser number derived from the tile size by [`pyramid_levels`]; it is
//! never stored, only recomputed.

use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// XML namespace of the Deep Zoom schema.
pub const DEEPZOOM_NAMESPACE: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// Tile image format. Tiles are always PNG, whatever the source format.
pub const TILE_FORMAT: &str = "png";

// =============================================================================
// Level derivation
// =============================================================================

/// Number of pyramid levels reported for an image.
///
/// `max(1, ceil(log2(max(width, height) / tile_size)) + 1)`. This is the only
/// place the formula lives; both the upload response and every manifest read
/// go through it.
pub fn pyramid_levels(width: u32, height: u32, tile_size: u32) -> u32 {
    if tile_size == 0 {
        return 1;
    }

    let ratio = f64::from(width.max(height)) / f64::from(tile_size);
    let levels = ratio.log2().ceil() + 1.0;

    if levels.is_finite() && levels > 1.0 {
        levels as u32
    } else {
        1
    }
}

/// Tiling geometry returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileInfo {
    /// Tile edge length actually used
    pub tile_size: u32,

    /// Derived level count (see [`pyramid_levels`])
    pub levels: u32,

    /// Always 0
    pub min_level: u32,

    /// `levels - 1`
    pub max_level: u32,

    /// Manifest location on the server
    pub dzi_path: String,
}

impl TileInfo {
    /// Derive tile info from pyramid geometry.
    pub fn derive(width: u32, height: u32, tile_size: u32, dzi_path: &Path) -> Self {
        let levels = pyramid_levels(width, height, tile_size);
        Self {
            tile_size,
            levels,
            min_level: 0,
            max_level: levels - 1,
            dzi_path: dzi_path.display().to_string(),
        }
    }
}

// =============================================================================
// Manifest
// =============================================================================

/// Contents of a `.dzi` manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub url: String,
    pub format: String,
    pub overlap: u32,
    pub tile_size: u32,
    pub width: u32,
    pub height: u32,
}

impl Manifest {
    /// Manifest for an image tiled under `<image_id>_files/`.
    pub fn for_image(
        image_id: impl std::fmt::Display,
        width: u32,
        height: u32,
        tile_size: u32,
        overlap: u32,
    ) -> Self {
        Self {
            url: format!("{}_files/", image_id),
            format: TILE_FORMAT.to_string(),
            overlap,
            tile_size,
            width,
            height,
        }
    }

    /// Render the manifest in the fixed schema.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="{ns}"
       Url="{url}"
       Format="{format}"
       Overlap="{overlap}"
       TileSize="{tile_size}"
       Width="{width}"
       Height="{height}">
</Image>"#,
            ns = DEEPZOOM_NAMESPACE,
            url = escape(self.url.as_str()),
            format = escape(self.format.as_str()),
            overlap = self.overlap,
            tile_size = self.tile_size,
            width = self.width,
            height = self.height,
        )
    }

    /// Parse a manifest.
    ///
    /// Attributes are read from the `Image` element. `Width` and `Height`
    /// may instead come from a standard DZI `<Size>` child, so descriptors
    /// produced by other Deep Zoom tools are accepted too. `Width`, `Height`
    /// and `TileSize` are required; `Overlap` defaults to 0.
    pub fn parse(xml: &str) -> Result<Self, ManifestError> {
        let mut reader = Reader::from_str(xml);
        let mut raw = RawAttributes::default();
        let mut saw_image = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"Image" => {
                        saw_image = true;
                        raw.collect(&e, true)?;
                    }
                    b"Size" if saw_image => raw.collect(&e, false)?,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(ManifestError::Xml(e.to_string())),
                _ => {}
            }
        }

        if !saw_image {
            return Err(ManifestError::Xml("no Image element".to_string()));
        }

        let width = required_u32("Width", raw.width)?;
        let height = required_u32("Height", raw.height)?;
        let tile_size = required_u32("TileSize", raw.tile_size)?;
        if tile_size == 0 {
            return Err(ManifestError::InvalidAttribute {
                name: "TileSize",
                value: "0".to_string(),
            });
        }
        let overlap = match raw.overlap {
            Some(value) => parse_u32("Overlap", &value)?,
            None => 0,
        };

        Ok(Self {
            url: raw.url.unwrap_or_default(),
            format: raw.format.unwrap_or_else(|| TILE_FORMAT.to_string()),
            overlap,
            tile_size,
            width,
            height,
        })
    }

    /// Derived tile info for this manifest.
    pub fn tile_info(&self, dzi_path: &Path) -> TileInfo {
        TileInfo::derive(self.width, self.height, self.tile_size, dzi_path)
    }
}

#[derive(Default)]
struct RawAttributes {
    url: Option<String>,
    format: Option<String>,
    overlap: Option<String>,
    tile_size: Option<String>,
    width: Option<String>,
    height: Option<String>,
}

impl RawAttributes {
    /// Collect known attributes of `element`. The first occurrence wins.
    fn collect(&mut self, element: &BytesStart<'_>, is_image: bool) -> Result<(), ManifestError> {
        for attr in element.attributes() {
            let attr = attr.map_err(|e| ManifestError::Xml(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| ManifestError::Xml(e.to_string()))?
                .into_owned();

            let slot = match (attr.key.local_name().as_ref(), is_image) {
                (b"Width", _) => &mut self.width,
                (b"Height", _) => &mut self.height,
                (b"Url", true) => &mut self.url,
                (b"Format", true) => &mut self.format,
                (b"Overlap", true) => &mut self.overlap,
                (b"TileSize", true) => &mut self.tile_size,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        Ok(())
    }
}

fn required_u32(name: &'static str, value: Option<String>) -> Result<u32, ManifestError> {
    let value = value.ok_or(ManifestError::MissingAttribute(name))?;
    parse_u32(name, &value)
}

fn parse_u32(name: &'static str, value: &str) -> Result<u32, ManifestError> {
    value
        .trim()
        .parse()
        .map_err(|_| ManifestError::InvalidAttribute {
            name,
            value: value.to_string(),
        })
}

// =============================================================================
// Deep Zoom geometry
// =============================================================================

/// Highest Deep Zoom level for the given image: `ceil(log2(max(width, height)))`.
pub fn max_dzi_level(width: u32, height: u32) -> u32 {
    let max_dim = width.max(height);
    if max_dim <= 1 {
        return 0;
    }
    f64::from(max_dim).log2().ceil() as u32
}

/// Dimensions of a Deep Zoom level.
///
/// At level L the image is divided by `2^(max_level - L)`, rounding up,
/// never below 1x1.
pub fn dzi_level_dimensions(width: u32, height: u32, level: u32, max_level: u32) -> (u32, u32) {
    if level > max_level {
        return (0, 0);
    }

    let shift = (max_level - level).min(63);
    let scale = 1u64 << shift;
    let level_width = u64::from(width).div_ceil(scale) as u32;
    let level_height = u64::from(height).div_ceil(scale) as u32;

    (level_width.max(1), level_height.max(1))
}

/// Tile columns and rows of a level.
pub fn dzi_tile_count(level_width: u32, level_height: u32, tile_size: u32) -> (u32, u32) {
    let tiles_x = level_width.div_ceil(tile_size);
    let tiles_y = level_height.div_ceil(tile_size);
    (tiles_x.max(1), tiles_y.max(1))
}

/// Pixel rectangle `(x, y, width, height)` of tile `(col, row)`.
///
/// Tiles extend by `overlap` pixels into each neighbour that exists, so edge
/// tiles only carry overlap on their inner sides.
pub fn tile_bounds(
    level_width: u32,
    level_height: u32,
    col: u32,
    row: u32,
    tile_size: u32,
    overlap: u32,
) -> (u32, u32, u32, u32) {
    let span = |index: u32, extent: u32| {
        let start = (index * tile_size).saturating_sub(if index > 0 { overlap } else { 0 });
        let end = ((index + 1) * tile_size + overlap).min(extent);
        (start, end.saturating_sub(start))
    };

    let (x, w) = span(col, level_width);
    let (y, h) = span(row, level_height);
    (x, y, w, h)
}

/// Parse tile coordinates from a file name like `3_5.png`.
pub fn parse_tile_file_name(file_name: &str) -> Option<(u32, u32)> {
    let name = file_name.strip_suffix(".png")?;
    let (x, y) = name.split_once('_')?;
    Some((x.parse().ok()?, y.parse().ok()?))
}
