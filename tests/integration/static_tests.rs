//! Static tile serving tests.
//!
//! Tests verify:
//! - Manifest served as XML with long-lived cache headers
//! - Tiles served from both the DZI path and the short alias
//! - Missing assets answer with the JSON 404 envelope

use axum::http::StatusCode;
use deep_zoom_server::storage::ImageId;
use deep_zoom_server::RouterConfig;

use super::test_utils::{json_body, TestApp};

#[tokio::test]
async fn test_manifest_file_is_served_as_xml() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, headers, body) = app.get(uploaded["dziUrl"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "application/xml");
    assert_eq!(
        headers.get("cache-control").unwrap(),
        "public, max-age=31536000"
    );

    let xml = String::from_utf8(body.to_vec()).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains(&format!("Url=\"{}_files/\"", id)));
}

#[tokio::test]
async fn test_tile_served_from_dzi_tree() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, headers, body) = app
        .get(&format!("/tiles/{}/{}_files/9/0_0.png", id, id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    assert!(headers.contains_key("cache-control"));
    assert!(body.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_tile_served_from_short_path() {
    let app = TestApp::new(RouterConfig::new().with_cache_max_age(60)).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();
    let image_id = ImageId::parse(id).unwrap();

    let (status, headers, short) = app.get(&app.storage.tile_url(&image_id, 9, 1, 0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=60");

    let (_, _, full) = app
        .get(&format!("/tiles/{}/{}_files/9/1_0.png", id, id))
        .await;
    assert_eq!(short, full);
}

#[tokio::test]
async fn test_missing_tile_is_not_found() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, headers, body) = app.get(&format!("/tiles/{}/42/0_0.png", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!headers.contains_key("cache-control"));
    assert_eq!(json_body(&body)["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_missing_manifest_file_is_not_found() {
    let app = TestApp::new(RouterConfig::new()).await;

    let (status, _, body) = app.get("/tiles/unknown/unknown.dzi").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["statusCode"], 404);
}

#[tokio::test]
async fn test_deleted_image_assets_disappear() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();
    let dzi_url = uploaded["dziUrl"].as_str().unwrap();

    let (status, _, _) = app.delete(&format!("/api/images/{}", id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) = app.get(dzi_url).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
