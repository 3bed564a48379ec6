//! API integration tests for service endpoints and read/delete error handling.
//!
//! Tests verify:
//! - Health and endpoint index
//! - 404 envelopes for unknown routes and unknown images
//! - Manifest, stats and delete lifecycle of an uploaded image
//! - Debug routes and production mode

use axum::http::StatusCode;
use deep_zoom_server::config::Environment;
use deep_zoom_server::storage::ImageId;
use deep_zoom_server::RouterConfig;

use super::test_utils::{json_body, TestApp};

// =============================================================================
// Service Endpoints
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(RouterConfig::new()).await;
    let (status, _, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    let json = json_body(&body);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["environment"], "development");
    assert!(json["uptime"].as_f64().unwrap() >= 0.0);
    assert!(json["timestamp"].is_string());
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_reports_production() {
    let app =
        TestApp::new(RouterConfig::new().with_environment(Environment::Production)).await;
    let (_, _, body) = app.get("/health").await;

    assert_eq!(json_body(&body)["environment"], "production");
}

#[tokio::test]
async fn test_demo_lists_endpoints() {
    let app = TestApp::new(RouterConfig::new()).await;
    let (status, _, body) = app.get("/api/demo").await;

    assert_eq!(status, StatusCode::OK);
    let json = json_body(&body);
    assert_eq!(json["endpoints"]["upload"], "POST /api/images/upload");
    assert_eq!(json["endpoints"]["delete"], "DELETE /api/images/{id}");
    assert!(json["endpoints"]["debugFiles"].is_string());
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new(RouterConfig::new()).await;
    let (status, _, body) = app.get("/api/nothing-here").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json = json_body(&body);
    assert_eq!(json["error"], "NOT_FOUND");
    assert_eq!(json["message"], "Route /api/nothing-here not found");
    assert_eq!(json["statusCode"], 404);
}

#[tokio::test]
async fn test_index_page() {
    let app = TestApp::new(RouterConfig::new()).await;
    let (status, headers, body) = app.get("/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(String::from_utf8_lossy(&body).contains("No image loaded"));
}

// =============================================================================
// Unknown Images
// =============================================================================

#[tokio::test]
async fn test_never_created_image_is_not_found() {
    let app = TestApp::new(RouterConfig::new()).await;
    let id = ImageId::generate();

    for uri in [
        format!("/api/images/{}/manifest", id),
        format!("/api/images/{}/stats", id),
        "/api/images/non-existent-id/manifest".to_string(),
        "/api/images/non-existent-id/stats".to_string(),
    ] {
        let (status, _, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);

        let json = json_body(&body);
        assert_eq!(json["error"], "NOT_FOUND");
        assert_eq!(json["message"], "Image not found");
    }
}

#[tokio::test]
async fn test_delete_never_created_image() {
    let app = TestApp::new(RouterConfig::new()).await;

    let (status, _, body) = app.delete("/api/images/non-existent-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["message"], "Image not found");

    let (status, _, _) = app
        .delete(&format!("/api/images/{}", ImageId::generate()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_half_created_image_is_not_found() {
    let app = TestApp::new(RouterConfig::new()).await;
    let id = ImageId::generate();

    // Upload directory only, no tile tree
    std::fs::create_dir_all(app.storage.upload_dir(&id)).unwrap();

    let (status, _, _) = app.get(&format!("/api/images/{}/manifest", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_viewer_for_unknown_image() {
    let app = TestApp::new(RouterConfig::new()).await;
    let (status, _, body) = app.get(&format!("/view/{}", ImageId::generate())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["error"], "NOT_FOUND");
}

// =============================================================================
// Image Lifecycle
// =============================================================================

#[tokio::test]
async fn test_manifest_matches_upload() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, _, body) = app.get(&format!("/api/images/{}/manifest", id)).await;
    assert_eq!(status, StatusCode::OK);

    let manifest = json_body(&body);
    assert_eq!(manifest["id"], uploaded["id"]);
    assert_eq!(manifest["width"], uploaded["width"]);
    assert_eq!(manifest["height"], uploaded["height"]);
    assert_eq!(manifest["dziUrl"], uploaded["dziUrl"]);
    assert_eq!(
        manifest["tileInfo"]["tileSize"],
        uploaded["tileInfo"]["tileSize"]
    );
    assert_eq!(manifest["tileInfo"]["levels"], uploaded["tileInfo"]["levels"]);
    assert!(manifest["createdAt"].is_string());
}

#[tokio::test]
async fn test_stats_of_uploaded_image() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, _, body) = app.get(&format!("/api/images/{}/stats", id)).await;
    assert_eq!(status, StatusCode::OK);

    let stats = json_body(&body);
    let upload_size = stats["uploadSize"].as_u64().unwrap();
    let tiles_size = stats["tilesSize"].as_u64().unwrap();
    assert!(upload_size > 0);
    assert!(tiles_size > 0);
    assert_eq!(stats["totalSize"].as_u64().unwrap(), upload_size + tiles_size);
}

#[tokio::test]
async fn test_delete_uploaded_image() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id_str = uploaded["id"].as_str().unwrap();
    let id = ImageId::parse(id_str).unwrap();

    assert!(app.storage.exists(&id).await);

    let (status, _, body) = app.delete(&format!("/api/images/{}", id_str)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    assert!(!app.storage.exists(&id).await);
    assert!(!app.storage.upload_dir(&id).exists());
    assert!(!app.storage.tile_tree_root(&id).exists());

    // A second delete is a 404, not a silent success
    let (status, _, _) = app.delete(&format!("/api/images/{}", id_str)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app.get(&format!("/api/images/{}/manifest", id_str)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_corrupt_manifest_is_server_error() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = ImageId::parse(uploaded["id"].as_str().unwrap()).unwrap();

    std::fs::write(app.storage.manifest_path(&id), "<Image Width=\"10\"/>").unwrap();

    let (status, _, body) = app.get(&format!("/api/images/{}/manifest", id)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let json = json_body(&body);
    assert_eq!(json["error"], "INVALID_MANIFEST");
    assert_eq!(json["message"], "Invalid DZI manifest file");
    assert_eq!(json["statusCode"], 500);
}

#[tokio::test]
async fn test_missing_manifest_is_server_error() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = ImageId::parse(uploaded["id"].as_str().unwrap()).unwrap();

    std::fs::remove_file(app.storage.manifest_path(&id)).unwrap();

    let (status, _, body) = app.get(&format!("/api/images/{}/manifest", id)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["error"], "INVALID_MANIFEST");
}

#[tokio::test]
async fn test_non_canonical_id_is_not_found() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let upper = uploaded["id"].as_str().unwrap().to_uppercase();

    for uri in [
        format!("/api/images/{}/manifest", upper),
        format!("/api/images/{}/stats", upper),
        format!("/view/{}", upper),
    ] {
        let (status, _, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(json_body(&body)["message"], "Image not found");
    }

    let (status, _, _) = app.delete(&format!("/api/images/{}", upper)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The canonical id still resolves
    let (status, _, _) = app
        .get(&format!("/api/images/{}/manifest", uploaded["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_viewer_for_uploaded_image() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, _, body) = app.get(&format!("/view/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).contains(&format!("/api/images/{}/manifest", id)));
}

// =============================================================================
// Debug Routes
// =============================================================================

#[tokio::test]
async fn test_debug_routes_in_development() {
    let app = TestApp::new(RouterConfig::new()).await;
    let uploaded = app.upload_png(300, 200).await;
    let id = uploaded["id"].as_str().unwrap();

    let (status, _, body) = app.get(&format!("/api/debug/dzi/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let json = json_body(&body);
    assert_eq!(json["exists"], true);
    assert!(json["content"]
        .as_str()
        .unwrap()
        .contains(&format!("Url=\"{}_files/\"", id)));
    assert_eq!(
        json["contentLength"].as_u64().unwrap() as usize,
        json["content"].as_str().unwrap().len()
    );

    let (status, _, body) = app.get(&format!("/api/debug/files/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let json = json_body(&body);
    assert_eq!(json["uploadsExists"], true);
    assert_eq!(json["tilesExists"], true);
    assert_eq!(json["uploadsFiles"].as_array().unwrap().len(), 1);
    assert!(json["tilesFiles"]
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["path"] == format!("{}.dzi", id)));
}

#[tokio::test]
async fn test_debug_dzi_missing() {
    let app = TestApp::new(RouterConfig::new()).await;
    let (status, _, body) = app
        .get(&format!("/api/debug/dzi/{}", ImageId::generate()))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["message"], "DZI file not found");
}

#[tokio::test]
async fn test_debug_routes_hidden_in_production() {
    let app =
        TestApp::new(RouterConfig::new().with_environment(Environment::Production)).await;
    let id = ImageId::generate();

    let (status, _, body) = app.get(&format!("/api/debug/files/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_body(&body)["message"]
        .as_str()
        .unwrap()
        .starts_with("Route "));

    let (_, _, body) = app.get("/api/demo").await;
    assert!(json_body(&body)["endpoints"]["debugFiles"].is_null());
}
