use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while creating an image's on-disk footprint.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Upload or tile directories could not be created
    #[error("Failed to create directories for image {id}: {source}")]
    CreateDirectories {
        id: String,
        #[source]
        source: std::io::Error,
    },

    /// The uploaded bytes could not be written to disk
    #[error("Failed to write upload to {path}: {source}")]
    WriteUpload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-level constraint violations detected before anything touches disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Upload exceeds the configured size limit
    #[error("File size exceeds maximum allowed size of {}MB", max_size / (1024 * 1024))]
    FileTooLarge { max_size: u64 },

    /// MIME type is not one of the accepted image types
    #[error("File type {mime_type} is not allowed. Allowed types: {allowed}")]
    InvalidType { mime_type: String, allowed: String },
}

/// Errors about the decoded image itself (as opposed to the uploaded file).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageValidationError {
    /// The file could not be opened or its header could not be decoded
    #[error("Failed to validate image: {0}")]
    Unreadable(String),

    /// Either side is below the minimum dimension
    #[error("Image dimensions must be at least {min}x{min} pixels")]
    TooSmall { width: u32, height: u32, min: u32 },

    /// Either side is above the maximum dimension
    #[error("Image dimensions must not exceed {max}x{max} pixels")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Errors that can occur while materialising a tile pyramid.
#[derive(Debug, Error)]
pub enum TilingError {
    /// Source image could not be opened or decoded
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The tiling engine reported a failure
    #[error("Tiling engine failed: {0}")]
    Engine(String),

    /// The engine returned successfully but left no tile tree behind
    #[error("Tiling engine produced no tiles at {}", path.display())]
    NoTiles { path: PathBuf },

    /// Manifest could not be written
    #[error("Failed to write manifest {}: {source}", path.display())]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest write returned but the file is not on disk
    #[error("Manifest not created at expected path: {}", path.display())]
    ManifestMissing { path: PathBuf },

    /// Manifest on disk does not parse back
    #[error("Manifest written for tiling is invalid: {0}")]
    Manifest(#[from] ManifestError),
}

/// Errors reading or parsing a persisted manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file could not be read
    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest is not well-formed XML
    #[error("Malformed manifest XML: {0}")]
    Xml(String),

    /// A required attribute is absent
    #[error("Invalid DZI file: missing required attribute {0}")]
    MissingAttribute(&'static str),

    /// An attribute is present but not a usable value
    #[error("Invalid value for manifest attribute {name}: {value:?}")]
    InvalidAttribute { name: &'static str, value: String },
}
