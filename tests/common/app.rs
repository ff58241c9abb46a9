//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tower::ServiceExt;

use ticketd::models::AppConfig;
use ticketd::server::{build_router, create_app_state};

/// Test application with its own asset store and work directory
pub struct TestApp {
    router: axum::Router,
    assets: TempDir,
    work: TempDir,
}

impl TestApp {
    /// Create a test application with default settings
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test application, adjusting the config before startup.
    /// Asset and work directories always point at fresh temp dirs.
    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let assets = tempfile::tempdir().expect("Failed to create assets dir");
        let work = tempfile::tempdir().expect("Failed to create work dir");

        let mut config = AppConfig {
            assets_dir: assets.path().to_path_buf(),
            work_dir: work.path().to_path_buf(),
            fetch_retries: 0,
            ..AppConfig::default()
        };
        adjust(&mut config);

        let state = create_app_state(config).expect("Failed to create app state");
        let router = build_router(state);

        Self {
            router,
            assets,
            work,
        }
    }

    pub fn assets_dir(&self) -> &Path {
        self.assets.path()
    }

    pub fn work_dir(&self) -> &Path {
        self.work.path()
    }

    /// Put a file into the local asset store
    pub fn add_asset(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.assets.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create asset dir");
        }
        std::fs::write(&path, bytes).expect("Failed to write asset");
        path
    }

    /// Make a GET request to the given path
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::get(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Make an OPTIONS (CORS preflight) request
    pub async fn preflight(&self, path: &str, origin: &str) -> TestResponse {
        let request = Request::builder()
            .method("OPTIONS")
            .uri(path)
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .body(Body::empty())
            .unwrap();
        self.request(request).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    /// Make a POST request with a url-encoded form body
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(form_body(fields)))
            .unwrap();
        self.request(request).await
    }

    /// Send a request to the router
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode form fields the way a browser does
pub fn form_body(fields: &[(&str, &str)]) -> String {
    let mut url = reqwest::Url::parse("http://form.invalid/").expect("static URL");
    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in fields {
            pairs.append_pair(name, value);
        }
    }
    url.query().unwrap_or_default().to_string()
}

/// Test response with convenience methods
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// Get body as string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
