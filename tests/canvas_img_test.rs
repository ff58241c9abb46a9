//! Integration tests for POST /canvas-img

mod common;

use axum::http::StatusCode;
use common::fixtures::{barcode_group, double_encoded, png_bytes, scene, text};
use common::{assert_error, assert_ok, assert_rendered_jpeg, decode_data_uri, MockAssetServer, TestApp};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

#[tokio::test]
async fn test_legacy_form_request_renders_jpeg() {
    let app = TestApp::new();
    let scene = scene(300, 120, vec![text("Hello <%name%>", 10.0, 10.0)]);

    let response = app
        .post_form(
            "/canvas-img",
            &[
                ("json", &scene.to_string()),
                ("attributes", &double_encoded(&json!({"name": "World"}))),
            ],
        )
        .await;

    assert_rendered_jpeg(&response);
    let body: Value = response.json();
    assert_eq!(body["warnings"], json!([]));
    assert!(body.get("pdf").is_none());
    assert!(body.get("file").is_none());
}

#[tokio::test]
async fn test_json_request_with_inline_documents() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(200, 100, vec![text("Seat <%seat%>", 5.0, 5.0)]),
                "attributes": {"seat": "12B"},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
}

#[tokio::test]
async fn test_jpeg_has_canvas_dimensions() {
    let app = TestApp::new();

    let response = app
        .post_json("/canvas-img", &json!({"json": scene(321, 123, vec![])}))
        .await;

    let jpeg = assert_rendered_jpeg(&response);
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (321, 123));
}

#[tokio::test]
async fn test_malformed_scene_is_rejected() {
    let app = TestApp::new();

    let response = app
        .post_form("/canvas-img", &[("json", "{\"width\": 10,"), ("attributes", "{}")])
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");

    let response = app.post_form("/canvas-img", &[("attributes", "{}")]).await;
    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");

    let response = app
        .post_json("/canvas-img", &json!({"json": {"width": 0, "height": 10}}))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");
}

#[tokio::test]
async fn test_malformed_attributes_are_rejected() {
    let app = TestApp::new();
    let scene = scene(100, 100, vec![]).to_string();

    let response = app
        .post_form("/canvas-img", &[("json", &scene), ("attributes", "[1, 2]")])
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");

    let response = app
        .post_form("/canvas-img", &[("json", &scene), ("attributes", "{oops")])
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");
}

#[tokio::test]
async fn test_get_is_not_allowed() {
    let app = TestApp::new();

    let response = app.get("/canvas-img").await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_logo_placeholder_is_fetched() {
    let mock = MockAssetServer::start().await;
    mock.mock_png("/logos/acme.png", png_bytes(80, 40, [0, 0, 255]), 1)
        .await;

    let app = TestApp::new();
    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(300, 200, vec![text("<%logo%>", 20.0, 20.0), text("<%name%>", 20.0, 120.0)]),
                "attributes": {"logos": {"logo": mock.url_for("/logos/acme.png")}, "name": "ACME"},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
    let body: Value = response.json();
    assert_eq!(body["warnings"], json!([]));
}

#[tokio::test]
async fn test_failed_logo_is_reported_as_warning() {
    let mock = MockAssetServer::start().await;
    mock.mock_error("/logos/missing.png", 404).await;
    let url = mock.url_for("/logos/missing.png");

    let app = TestApp::new();
    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(300, 200, vec![text("Title", 0.0, 0.0), text("<%logo%>", 20.0, 20.0)]),
                "attributes": {"logos": {"logo": url}},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
    let body: Value = response.json();
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["node_index"], 1);
    assert_eq!(warnings[0]["source"], url);
    assert!(warnings[0]["message"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_barcode_is_fetched_and_composited() {
    let mock = MockAssetServer::start().await;
    mock.mock_png("/barcodes/123.png", png_bytes(618, 200, [0, 0, 0]), 1)
        .await;

    let app = TestApp::new();
    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(600, 400, vec![barcode_group(0.0, 197.0, 0.0, "Barcode")]),
                "attributes": {"barcode": mock.url_for("/barcodes/123.png")},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
}

#[tokio::test]
async fn test_barcode_load_failure_is_fatal() {
    let mock = MockAssetServer::start().await;
    mock.mock_error("/barcodes/gone.png", 404).await;

    let app = TestApp::new();
    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(600, 400, vec![barcode_group(0.0, 197.0, 0.0, "Barcode")]),
                "attributes": {"barcode": mock.url_for("/barcodes/gone.png")},
            }),
        )
        .await;

    assert_error(
        &response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "asset_load_failure",
    );
}

#[tokio::test]
async fn test_missing_barcode_attribute_still_renders() {
    let app = TestApp::new();
    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(600, 400, vec![barcode_group(0.0, 197.0, 0.0, "Barcode")]),
                "attributes": {"name": "x"},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
}

#[tokio::test]
async fn test_img_back_end_writes_temp_png() {
    let app = TestApp::new();
    let scene = scene(120, 60, vec![text("stored", 0.0, 0.0)]).to_string();

    let response = app
        .post_form(
            "/canvas-img",
            &[("json", &scene), ("attributes", "{}"), ("imgBackEnd", "true")],
        )
        .await;

    assert_rendered_jpeg(&response);
    let body: Value = response.json();
    let file = std::path::PathBuf::from(body["file"].as_str().expect("Expected file path"));

    assert!(file.starts_with(app.work_dir()));
    let name = file.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("temp_") && name.ends_with(".png"), "{name}");
    assert_eq!(name.len(), "temp_XXXXX.png".len());

    let png = std::fs::read(&file).unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (120, 60));
}

#[tokio::test]
async fn test_img_back_end_false_writes_nothing() {
    let app = TestApp::new();
    let scene = scene(50, 50, vec![]).to_string();

    let response = app
        .post_form("/canvas-img", &[("json", &scene), ("imgBackEnd", "false")])
        .await;

    assert_ok(&response);
    assert_eq!(std::fs::read_dir(app.work_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_pdf_flag_returns_pdf_data_uri() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/canvas-img",
            &json!({"json": scene(200, 100, vec![text("pdf", 0.0, 0.0)]), "pdf": true}),
        )
        .await;

    assert_rendered_jpeg(&response);
    let body: Value = response.json();
    let pdf = decode_data_uri(body["pdf"].as_str().unwrap(), "application/pdf");
    assert!(pdf.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_local_store_logo() {
    let app = TestApp::new();
    app.add_asset("logos/local.png", &png_bytes(10, 10, [0, 255, 0]));

    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(100, 100, vec![text("<%logo%>", 0.0, 0.0)]),
                "attributes": {"logos": {"logo": "logos/local.png"}},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
    let body: Value = response.json();
    assert_eq!(body["warnings"], json!([]));
}

#[tokio::test]
async fn test_oversized_canvas_is_rejected() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/canvas-img",
            &json!({"json": {"width": 60000, "height": 60000, "objects": []}}),
        )
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");
    assert!(response.text().contains("60000x60000"));
}

#[tokio::test]
async fn test_canvas_limit_is_configurable() {
    let app = TestApp::with_config(|config| config.max_canvas_pixels = 100);

    let response = app
        .post_json("/canvas-img", &json!({"json": scene(11, 10, vec![])}))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "malformed_input");

    let response = app
        .post_json("/canvas-img", &json!({"json": scene(10, 10, vec![])}))
        .await;
    assert_rendered_jpeg(&response);
}

#[tokio::test]
async fn test_control_characters_in_values_still_render() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/canvas-img",
            &json!({
                "json": scene(200, 100, vec![text("Seat <%seat%>", 5.0, 5.0)]),
                "attributes": {"seat": "12\u{C}B\u{1}"},
            }),
        )
        .await;

    assert_rendered_jpeg(&response);
}
