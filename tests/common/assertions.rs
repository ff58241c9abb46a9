//! Assertion helpers for tests.

use axum::http::StatusCode;
use base64::Engine;
use pretty_assertions::assert_eq;

use super::app::TestResponse;

/// Assert response has expected status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        response.status,
        response.text()
    );
}

/// Assert response is OK (200)
pub fn assert_ok(response: &TestResponse) {
    assert_status(response, StatusCode::OK);
}

/// Decode a base64 data URI with the given MIME type, panicking otherwise
pub fn decode_data_uri(uri: &str, mime: &str) -> Vec<u8> {
    let prefix = format!("data:{mime};base64,");
    let payload = uri
        .strip_prefix(&prefix)
        .unwrap_or_else(|| panic!("Expected {prefix}... got {}", &uri[..40.min(uri.len())]));
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .expect("Invalid base64 payload")
}

/// Assert a successful render and return the decoded JPEG bytes
pub fn assert_rendered_jpeg(response: &TestResponse) -> Vec<u8> {
    assert_ok(response);
    let json: serde_json::Value = response.json();
    let image = json["image"].as_str().expect("Expected image field");
    let jpeg = decode_data_uri(image, "image/jpeg");
    assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF], "Expected JPEG magic bytes");
    jpeg
}

/// Assert a structured error body with the given status and taxonomy code
pub fn assert_error(response: &TestResponse, status: StatusCode, code: &str) {
    assert_status(response, status);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"].as_u64(), Some(status.as_u16() as u64));
    assert_eq!(json["code"].as_str(), Some(code), "Full body: {json}");
    assert!(json["error"].is_string(), "Expected error message");
}
