//! Deterministic path derivation and lifecycle for an image's directories.
//!
//! Every path here is a pure function of the [`ImageId`] (plus the original
//! file extension for the upload). There are no counters or indexes, so two
//! concurrent uploads never contend for anything but disjoint directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::ImageId;
use crate::error::StorageError;

/// Directory (under the data dir) holding original uploads.
pub const UPLOADS_DIR: &str = "uploads";

/// Directory (under the data dir) holding tile trees.
pub const TILES_DIR: &str = "tiles";

/// Stem of the stored original upload.
const ORIGINAL_STEM: &str = "original";

// =============================================================================
// Sizes and listings
// =============================================================================

/// Aggregate on-disk footprint of one image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSize {
    /// Bytes under the upload directory
    pub upload_bytes: u64,

    /// Bytes under the tile-tree directory (manifest included)
    pub tile_bytes: u64,
}

impl ImageSize {
    /// Combined size of upload and tiles.
    pub fn total(&self) -> u64 {
        self.upload_bytes + self.tile_bytes
    }
}

/// One entry of a directory listing, relative to the listed root.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
}

// =============================================================================
// Storage Layout
// =============================================================================

/// Maps image ids to filesystem paths and owns their create/delete lifecycle.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    uploads_dir: PathBuf,
    tiles_dir: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            uploads_dir: data_dir.join(UPLOADS_DIR),
            tiles_dir: data_dir.join(TILES_DIR),
        }
    }

    /// Root directory of all uploads.
    pub fn uploads_root(&self) -> &Path {
        &self.uploads_dir
    }

    /// Root directory of all tile trees. This is what `/tiles` serves.
    pub fn tiles_root(&self) -> &Path {
        &self.tiles_dir
    }

    /// Create the upload and tile roots if they are missing.
    pub async fn ensure_base_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        tokio::fs::create_dir_all(&self.tiles_dir).await
    }

    // -------------------------------------------------------------------------
    // Path derivation
    // -------------------------------------------------------------------------

    /// Directory holding the original upload of `id`.
    pub fn upload_dir(&self, id: &ImageId) -> PathBuf {
        self.uploads_dir.join(id.to_string())
    }

    /// Path of the stored original: `uploads/<id>/original.<ext>`.
    ///
    /// Only the extension of `original_name` is used, and only when it is
    /// plain ASCII alphanumeric; otherwise the file is stored as `original`.
    pub fn upload_path(&self, id: &ImageId, original_name: &str) -> PathBuf {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        let file_name = match extension {
            Some(ext) => format!("{}.{}", ORIGINAL_STEM, ext),
            None => ORIGINAL_STEM.to_string(),
        };

        self.upload_dir(id).join(file_name)
    }

    /// Root of the tile tree: `tiles/<id>`.
    pub fn tile_tree_root(&self, id: &ImageId) -> PathBuf {
        self.tiles_dir.join(id.to_string())
    }

    /// Output stem handed to the tiling engine: `tiles/<id>/<id>`.
    ///
    /// The engine appends `_files/` for the pyramid, the manifest appends `.dzi`.
    pub fn tile_base(&self, id: &ImageId) -> PathBuf {
        self.tile_tree_root(id).join(id.to_string())
    }

    /// Pyramid directory: `tiles/<id>/<id>_files`.
    pub fn tile_files_dir(&self, id: &ImageId) -> PathBuf {
        self.tile_tree_root(id).join(format!("{}_files", id))
    }

    /// Manifest file: `tiles/<id>/<id>.dzi`.
    pub fn manifest_path(&self, id: &ImageId) -> PathBuf {
        self.tile_tree_root(id).join(format!("{}.dzi", id))
    }

    /// Public URL of the manifest.
    pub fn dzi_url(&self, id: &ImageId) -> String {
        format!("/tiles/{}/{}.dzi", id, id)
    }

    /// Public URL of a single tile.
    pub fn tile_url(&self, id: &ImageId, level: u32, x: u32, y: u32) -> String {
        format!("/tiles/{}/{}/{}_{}.png", id, level, x, y)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Create both directories of `id`. Pre-existing directories are fine.
    pub async fn create_directories(&self, id: &ImageId) -> Result<(), StorageError> {
        for dir in [self.upload_dir(id), self.tile_tree_root(id)] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| StorageError::CreateDirectories {
                    id: id.to_string(),
                    source,
                })?;
        }
        debug!(image_id = %id, "Created image directories");
        Ok(())
    }

    /// Write the uploaded bytes to `path`.
    pub async fn write_upload(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        tokio::fs::write(path, data)
            .await
            .map_err(|source| StorageError::WriteUpload {
                path: path.to_path_buf(),
                source,
            })
    }

    /// True only if both the upload and tile directories are present.
    ///
    /// A half-created image reports `false`, so callers see "not found"
    /// rather than "found but broken".
    pub async fn exists(&self, id: &ImageId) -> bool {
        let (upload, tiles) = tokio::join!(
            is_dir(self.upload_dir(id)),
            is_dir(self.tile_tree_root(id))
        );
        upload && tiles
    }

    /// Recursive byte totals of both directories. Missing directories count 0.
    pub async fn size(&self, id: &ImageId) -> ImageSize {
        let upload_dir = self.upload_dir(id);
        let tile_dir = self.tile_tree_root(id);

        let result = tokio::task::spawn_blocking(move || ImageSize {
            upload_bytes: directory_size(&upload_dir),
            tile_bytes: directory_size(&tile_dir),
        })
        .await;

        match result {
            Ok(size) => size,
            Err(e) => {
                warn!(image_id = %id, "Size computation aborted: {}", e);
                ImageSize::default()
            }
        }
    }

    /// Best-effort recursive removal of both directories of `id`.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn delete(&self, id: &ImageId) {
        for dir in [self.upload_dir(id), self.tile_tree_root(id)] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(image_id = %id, path = %dir.display(), "Removed directory"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(
                    image_id = %id,
                    path = %dir.display(),
                    "Failed to remove directory: {}",
                    e
                ),
            }
        }
    }

    /// List every file and directory under the upload and tile directories.
    ///
    /// Returns `(uploads, tiles)`; unreadable entries are skipped.
    pub async fn list_files(&self, id: &ImageId) -> (Vec<FileEntry>, Vec<FileEntry>) {
        let upload_dir = self.upload_dir(id);
        let tile_dir = self.tile_tree_root(id);

        tokio::task::spawn_blocking(move || (list_tree(&upload_dir), list_tree(&tile_dir)))
            .await
            .unwrap_or_default()
    }
}

async fn is_dir(path: PathBuf) -> bool {
    tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn directory_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(root = %root.display(), "Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

fn list_tree(root: &Path) -> Vec<FileEntry> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            FileEntry {
                path: relative.to_string_lossy().replace('\\', "/"),
                is_directory: entry.file_type().is_dir(),
                size: entry
                    .metadata()
                    .ok()
                    .filter(|meta| meta.is_file())
                    .map(|meta| meta.len())
                    .unwrap_or(0),
            }
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
