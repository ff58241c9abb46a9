//! Mock HTTP server serving logo and barcode images.

use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Wrapper around wiremock MockServer with convenience methods
pub struct MockAssetServer {
    pub server: MockServer,
}

impl MockAssetServer {
    /// Start a new mock HTTP server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get URL for a specific path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Serve a PNG at `endpoint`, expecting exactly `hits` requests
    pub async fn mock_png(&self, endpoint: &str, png: Vec<u8>, hits: u64) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png)
                    .insert_header("content-type", "image/png"),
            )
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Serve a PNG after a delay
    pub async fn mock_slow_png(&self, endpoint: &str, png: Vec<u8>, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png)
                    .insert_header("content-type", "image/png")
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Mock an endpoint that returns an error
    pub async fn mock_error(&self, endpoint: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_string("error"))
            .mount(&self.server)
            .await;
    }
}
