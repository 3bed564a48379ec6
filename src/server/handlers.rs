//! HTTP request handlers for the Deep Zoom image API.
//!
//! # Endpoints
//!
//! - `POST /api/images/upload` - Upload and tile an image
//! - `GET /api/images/{id}/manifest` - Pyramid geometry of a stored image
//! - `GET /api/images/{id}/stats` - On-disk size of a stored image
//! - `DELETE /api/images/{id}` - Remove an image and its tiles
//! - `GET /health` - Health check endpoint
//! - `GET /api/demo` - Endpoint index
//! - `GET /api/debug/files/{id}`, `GET /api/debug/dzi/{id}` - Diagnostics

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::{Environment, DEFAULT_MAX_UPLOAD_SIZE};
use crate::error::{ImageValidationError, TilingError, UploadError};
use crate::storage::{FileEntry, ImageId, StorageLayout};
use crate::tile::{TileInfo, TilingEngine, TilingService};

/// MIME types accepted by the upload endpoint.
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/tiff",
    "image/tif",
];

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tiling service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<E: TilingEngine> {
    /// Tiling service (owns the storage layout)
    pub tiling: Arc<TilingService<E>>,

    /// Upload limit in bytes
    pub max_upload_size: u64,

    /// Deployment environment
    pub environment: Environment,

    /// Process start, for the health endpoint
    pub started_at: Instant,
}

impl<E: TilingEngine> AppState<E> {
    /// Create a new application state with the given tiling service.
    pub fn new(tiling: TilingService<E>) -> Self {
        Self {
            tiling: Arc::new(tiling),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            environment: Environment::Development,
            started_at: Instant::now(),
        }
    }

    /// Set the upload limit in bytes.
    pub fn with_max_upload_size(mut self, max_upload_size: u64) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }

    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn storage(&self) -> &StorageLayout {
        self.tiling.storage()
    }

    /// Build an internal error, hiding `detail` from clients in production.
    fn internal_error(&self, message: &str, detail: impl Display) -> ApiError {
        error!(detail = %detail, "{}", message);
        if self.environment.is_production() {
            ApiError::Internal(GENERIC_ERROR_MESSAGE.to_string())
        } else {
            ApiError::Internal(format!("{}: {}", message, detail))
        }
    }

    fn tiling_error(&self, err: TilingError) -> ApiError {
        error!(error = %err, "Tiling failed");
        if self.environment.is_production() {
            ApiError::Tiling("Failed to create image tiles".to_string())
        } else {
            ApiError::Tiling(format!("Failed to create image tiles: {}", err))
        }
    }
}

impl<E: TilingEngine> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            tiling: Arc::clone(&self.tiling),
            max_upload_size: self.max_upload_size,
            environment: self.environment,
            started_at: self.started_at,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error envelope returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "NOT_FOUND", "VALIDATION_ERROR")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status_code: status.as_u16(),
        }
    }
}

/// Description of a stored image, returned by upload and manifest reads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub dzi_url: String,
    pub tile_info: TileInfo,
    pub created_at: DateTime<Utc>,
}

/// On-disk footprint of a stored image.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub id: String,
    pub upload_size: u64,
    pub tiles_size: u64,
    pub total_size: u64,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: String,

    pub timestamp: DateTime<Utc>,

    /// Seconds since the server started
    pub uptime: f64,

    pub environment: String,

    /// Service version
    pub version: String,
}

/// Diagnostic listing of an image's files.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugFilesResponse {
    pub id: String,
    pub uploads_dir: String,
    pub tiles_dir: String,
    pub uploads_exists: bool,
    pub tiles_exists: bool,
    pub uploads_files: Vec<FileEntry>,
    pub tiles_files: Vec<FileEntry>,
}

/// Raw manifest content of an image.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugManifestResponse {
    pub exists: bool,
    pub path: String,
    pub content_length: usize,
    pub content: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Missing or malformed input
    BadRequest(String),

    /// File constraint violation (size, type)
    Validation(String),

    /// Decoded image violates the dimension bounds
    ImageValidation(String),

    /// The tiling engine or manifest verification failed
    Tiling(String),

    NotFound(String),

    /// Image exists but its manifest is unreadable
    InvalidManifest(String),

    Internal(String),
}

impl ApiError {
    /// The standard "Image not found" error.
    pub fn image_not_found() -> Self {
        ApiError::NotFound("Image not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::ImageValidation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Tiling(_) | ApiError::InvalidManifest(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error code carried in the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::ImageValidation(_) => "IMAGE_VALIDATION_ERROR",
            ApiError::Tiling(_) => "TILING_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidManifest(_) => "INVALID_MANIFEST",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Validation(m)
            | ApiError::ImageValidation(m)
            | ApiError::Tiling(m)
            | ApiError::NotFound(m)
            | ApiError::InvalidManifest(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ImageValidationError> for ApiError {
    fn from(err: ImageValidationError) -> Self {
        ApiError::ImageValidation(err.to_string())
    }
}

/// Convert ApiError to HTTP response.
///
/// Errors are logged by severity:
/// - 5xx errors at ERROR level
/// - 404 at DEBUG level (common and expected)
/// - other 4xx at WARN level
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.code();
        let message = self.message();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::new(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Upload
// =============================================================================

/// A file extracted from the multipart body.
struct UploadedFile {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /api/images/upload` (multipart, field `file`)
///
/// # Response
///
/// `201 Created` with JSON body:
/// ```json
/// {
///   "id": "7c0e5c1e-...",
///   "width": 1024,
///   "height": 768,
///   "dziUrl": "/tiles/7c0e5c1e-.../7c0e5c1e-....dzi",
///   "tileInfo": { "tileSize": 512, "levels": 2, "minLevel": 0, "maxLevel": 1, "dziPath": "..." },
///   "createdAt": "2024-01-01T00:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `400 BAD_REQUEST`: no file in the request
/// - `400 VALIDATION_ERROR`: file too large or not an accepted image type
/// - `400 IMAGE_VALIDATION_ERROR`: image dimensions out of bounds
/// - `500 TILING_ERROR`: tiling failed
///
/// Any failure after the upload has been stored removes the image's
/// directories before responding.
pub async fn upload_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ImageResponse>), ApiError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("Upload is not multipart: {}", rejection);
            return Err(ApiError::BadRequest("No file uploaded".to_string()));
        }
    };

    let upload = read_upload(&mut multipart, state.max_upload_size)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    check_mime_type(upload.content_type.as_deref())?;

    let id = ImageId::generate();
    info!(
        image_id = %id,
        file_name = %upload.file_name,
        size = upload.data.len(),
        "Processing upload"
    );

    match store_and_tile(&state, &id, &upload).await {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(err) => {
            warn!(image_id = %id, "Upload failed, removing partial image");
            state.storage().delete(&id).await;
            Err(err)
        }
    }
}

/// Pull the `file` field out of the body, enforcing the size limit while streaming.
async fn read_upload(
    multipart: &mut Multipart,
    max_size: u64,
) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // Plain form values named "file" are not uploads
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if (data.len() + chunk.len()) as u64 > max_size {
                return Err(UploadError::FileTooLarge { max_size }.into());
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(Some(UploadedFile {
            file_name,
            content_type,
            data: data.freeze(),
        }));
    }

    Ok(None)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Failed to read upload: {}", err.body_text()))
}

/// Reject anything that is not one of [`ALLOWED_MIME_TYPES`].
pub fn check_mime_type(content_type: Option<&str>) -> Result<(), UploadError> {
    let raw = content_type.unwrap_or("unknown");
    let essence = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if ALLOWED_MIME_TYPES.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(UploadError::InvalidType {
            mime_type: raw.to_string(),
            allowed: ALLOWED_MIME_TYPES.join(", "),
        })
    }
}

async fn store_and_tile<E: TilingEngine>(
    state: &AppState<E>,
    id: &ImageId,
    upload: &UploadedFile,
) -> Result<ImageResponse, ApiError> {
    let storage = state.storage();

    storage
        .create_directories(id)
        .await
        .map_err(|e| state.internal_error("Failed to process uploaded image", e))?;

    let path = storage.upload_path(id, &upload.file_name);
    storage
        .write_upload(&path, &upload.data)
        .await
        .map_err(|e| state.internal_error("Failed to process uploaded image", e))?;

    let metadata = state.tiling.validate(&path).await?;
    let estimate = state.tiling.estimate(metadata.width, metadata.height);
    info!(
        image_id = %id,
        width = metadata.width,
        height = metadata.height,
        format = %metadata.format,
        total_tiles = estimate.total_tiles,
        estimated_seconds = estimate.estimated_seconds,
        "Tiling image"
    );

    let tile_info = state
        .tiling
        .tile(&path, id, None)
        .await
        .map_err(|e| state.tiling_error(e))?;

    info!(
        image_id = %id,
        levels = tile_info.levels,
        tile_size = tile_info.tile_size,
        "Image tiled"
    );

    Ok(ImageResponse {
        id: id.to_string(),
        width: metadata.width,
        height: metadata.height,
        dzi_url: storage.dzi_url(id),
        tile_info,
        created_at: Utc::now(),
    })
}

// =============================================================================
// Image Handlers
// =============================================================================

/// Resolve a path segment to an existing image.
///
/// Segments that are not ids and half-created images are both "not found".
async fn find_image<E: TilingEngine>(
    state: &AppState<E>,
    raw_id: &str,
) -> Result<ImageId, ApiError> {
    let id = ImageId::parse(raw_id).ok_or_else(ApiError::image_not_found)?;
    if state.storage().exists(&id).await {
        Ok(id)
    } else {
        Err(ApiError::image_not_found())
    }
}

/// Handle manifest requests.
///
/// # Endpoint
///
/// `GET /api/images/{id}/manifest`
///
/// # Response
///
/// `200 OK` with the same body as a successful upload. Levels are derived
/// from the stored manifest on every read.
///
/// # Errors
///
/// - `404 NOT_FOUND`: image does not exist
/// - `500 INVALID_MANIFEST`: manifest missing or unparseable
pub async fn manifest_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let id = find_image(&state, &raw_id).await?;

    let manifest = state.tiling.read_manifest(&id).await.map_err(|e| {
        warn!(image_id = %id, error = %e, "Stored manifest is unusable");
        ApiError::InvalidManifest("Invalid DZI manifest file".to_string())
    })?;

    let manifest_path = state.storage().manifest_path(&id);

    Ok(Json(ImageResponse {
        id: id.to_string(),
        width: manifest.width,
        height: manifest.height,
        dzi_url: state.storage().dzi_url(&id),
        tile_info: manifest.tile_info(&manifest_path),
        // TODO: persist the upload time alongside the manifest; until then this is the read time
        created_at: Utc::now(),
    }))
}

/// Handle stats requests.
///
/// # Endpoint
///
/// `GET /api/images/{id}/stats`
///
/// # Response
///
/// `200 OK` with `{ id, uploadSize, tilesSize, totalSize }` in bytes.
///
/// # Errors
///
/// - `404 NOT_FOUND`: image does not exist
pub async fn stats_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    Path(raw_id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let id = find_image(&state, &raw_id).await?;
    let size = state.storage().size(&id).await;

    Ok(Json(StatsResponse {
        id: id.to_string(),
        upload_size: size.upload_bytes,
        tiles_size: size.tile_bytes,
        total_size: size.total(),
    }))
}

/// Handle delete requests.
///
/// # Endpoint
///
/// `DELETE /api/images/{id}`
///
/// # Response
///
/// `204 No Content`, even if parts of the removal failed (those are logged).
///
/// # Errors
///
/// - `404 NOT_FOUND`: image does not exist
pub async fn delete_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = find_image(&state, &raw_id).await?;
    state.storage().delete(&id).await;
    info!(image_id = %id, "Image deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Service Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "ok",
///   "timestamp": "2024-01-01T00:00:00Z",
///   "uptime": 12.5,
///   "environment": "development",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.environment.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle endpoint index requests.
///
/// # Endpoint
///
/// `GET /api/demo`
pub async fn demo_handler<E: TilingEngine>(State(state): State<AppState<E>>) -> Json<Value> {
    let mut endpoints = json!({
        "upload": "POST /api/images/upload",
        "manifest": "GET /api/images/{id}/manifest",
        "stats": "GET /api/images/{id}/stats",
        "delete": "DELETE /api/images/{id}",
        "manifestFile": "GET /tiles/{id}/{id}.dzi",
        "tile": "GET /tiles/{id}/{level}/{x}_{y}.png",
        "health": "GET /health",
    });

    if !state.environment.is_production() {
        endpoints["debugDzi"] = json!("GET /api/debug/dzi/{id}");
        endpoints["debugFiles"] = json!("GET /api/debug/files/{id}");
    }

    Json(json!({
        "message": "Deep Zoom image server is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

/// Fallback for unknown routes.
pub async fn route_not_found(uri: Uri) -> ApiError {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    ApiError::NotFound(format!("Route {} not found", target))
}

// =============================================================================
// Debug Handlers
// =============================================================================

/// List every file of an image.
///
/// # Endpoint
///
/// `GET /api/debug/files/{id}` (not mounted in production)
///
/// Works on half-created images too, which is the point.
pub async fn debug_files_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    Path(raw_id): Path<String>,
) -> Result<Json<DebugFilesResponse>, ApiError> {
    let id = ImageId::parse(&raw_id).ok_or_else(ApiError::image_not_found)?;
    let storage = state.storage();

    let uploads_dir = storage.upload_dir(&id);
    let tiles_dir = storage.tile_tree_root(&id);
    let (uploads_files, tiles_files) = storage.list_files(&id).await;

    Ok(Json(DebugFilesResponse {
        id: id.to_string(),
        uploads_exists: tokio::fs::try_exists(&uploads_dir).await.unwrap_or(false),
        tiles_exists: tokio::fs::try_exists(&tiles_dir).await.unwrap_or(false),
        uploads_dir: uploads_dir.display().to_string(),
        tiles_dir: tiles_dir.display().to_string(),
        uploads_files,
        tiles_files,
    }))
}

/// Return the raw manifest of an image.
///
/// # Endpoint
///
/// `GET /api/debug/dzi/{id}` (not mounted in production)
///
/// # Errors
///
/// - `404 NOT_FOUND`: no manifest on disk
pub async fn debug_manifest_handler<E: TilingEngine>(
    State(state): State<AppState<E>>,
    Path(raw_id): Path<String>,
) -> Result<Json<DebugManifestResponse>, ApiError> {
    let id = ImageId::parse(&raw_id).ok_or_else(ApiError::image_not_found)?;
    let path = state.storage().manifest_path(&id);

    let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
        debug!(image_id = %id, path = %path.display(), "Manifest not readable: {}", e);
        ApiError::NotFound("DZI file not found".to_string())
    })?;

    Ok(Json(DebugManifestResponse {
        exists: true,
        path: path.display().to_string(),
        content_length: content.len(),
        content,
    }))
}

// =============================================================================
// Tests
// =============================================================================
