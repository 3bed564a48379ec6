//! Test utilities for integration tests.
//!
//! This module provides a router harness over a temporary data directory,
//! multipart request builders, synthetic images and a mock tiling engine.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use deep_zoom_server::error::TilingError;
use deep_zoom_server::storage::StorageLayout;
use deep_zoom_server::tile::{
    PyramidEngine, PyramidSummary, TilingEngine, TilingOptions, TilingService,
};
use deep_zoom_server::{create_router, RouterConfig};

/// Tile size used by the harness; small enough to keep pyramids quick.
pub const TEST_TILE_SIZE: u32 = 256;

const BOUNDARY: &str = "dz-test-boundary-7MA4YWxkTrZu0gW";

// =============================================================================
// Router Harness
// =============================================================================

/// A router over a throwaway data directory.
pub struct TestApp {
    pub router: Router,
    pub storage: StorageLayout,
    _temp_dir: TempDir,
}

impl TestApp {
    /// App backed by the real pyramid engine.
    pub async fn new(config: RouterConfig) -> Self {
        Self::with_engine(PyramidEngine::new(), config).await
    }

    /// App backed by an arbitrary engine.
    pub async fn with_engine<E: TilingEngine>(engine: E, config: RouterConfig) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageLayout::new(temp_dir.path().join("data"));
        storage.ensure_base_dirs().await.unwrap();

        let options = TilingOptions {
            tile_size: TEST_TILE_SIZE,
            overlap: 1,
        };
        let service = TilingService::with_options(engine, storage.clone(), options);
        let router = create_router(service, config.with_tracing(false));

        Self {
            router,
            storage,
            _temp_dir: temp_dir,
        }
    }

    /// Send a request and collect status, headers and body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Upload a file through the multipart endpoint.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let request = upload_request(file_part(file_name, content_type, data));
        let (status, _, body) = self.send(request).await;
        (status, json_body(&body))
    }

    /// Upload a synthetic PNG and assert it succeeded.
    pub async fn upload_png(&self, width: u32, height: u32) -> Value {
        let (status, body) = self
            .upload("test.png", "image/png", &png_bytes(width, height))
            .await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", body);
        body
    }

    /// Number of entries directly under `dir`.
    pub fn entry_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }
}

// =============================================================================
// Request Builders
// =============================================================================

/// One multipart part carrying a file.
pub fn file_part(file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut part = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    part.extend_from_slice(data);
    part.extend_from_slice(b"\r\n");
    part
}

/// One multipart part carrying a plain form value.
pub fn text_part(name: &str, value: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
         {value}\r\n"
    )
    .into_bytes()
}

/// Wrap parts into a complete upload request.
pub fn upload_request(parts: Vec<u8>) -> Request<Body> {
    let mut body = parts;
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/images/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

// =============================================================================
// Images
// =============================================================================

/// Encode a patterned RGB image as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png).unwrap();
    cursor.into_inner()
}

/// Encode a patterned RGB image as JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, 128, (y % 256) as u8])
    });

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Jpeg).unwrap();
    cursor.into_inner()
}

/// Encode a patterned 16-bit RGB image as TIFF.
pub fn tiff16_bytes(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 200) as u16, (y * 300) as u16, 40_000])
    });

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb16(img)
        .write_to(&mut cursor, ImageFormat::Tiff)
        .unwrap();
    cursor.into_inner()
}

// =============================================================================
// Mock Engine
// =============================================================================

/// Engine that claims success but writes nothing.
pub struct NoopEngine;

#[async_trait]
impl TilingEngine for NoopEngine {
    async fn tile(
        &self,
        _source: &Path,
        _output_base: &Path,
        _tile_size: u32,
        _overlap: u32,
    ) -> Result<PyramidSummary, TilingError> {
        Ok(PyramidSummary {
            levels: 0,
            tiles: 0,
        })
    }
}
