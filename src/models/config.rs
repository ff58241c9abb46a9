use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from an optional YAML file, with
/// environment variable overrides for paths and the bind address.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server binds to (env: BIND_ADDR)
    pub bind_addr: String,

    /// Root of the local asset store for logo/barcode paths (env: ASSETS_DIR)
    pub assets_dir: PathBuf,

    /// Directory for `temp_XXXXX.png` rasters (env: WORK_DIR)
    pub work_dir: PathBuf,

    /// Editor client files served as the router fallback (env: STATIC_DIR)
    pub static_dir: Option<PathBuf>,

    /// Extra font files for text rendering (env: FONTS_DIR)
    pub fonts_dir: Option<PathBuf>,

    /// JPEG quality in 0.0..=1.0
    pub jpeg_quality: f32,

    /// Per-asset load timeout
    pub asset_timeout_secs: u64,

    /// Whole-render timeout
    pub render_timeout_secs: u64,

    /// Extra attempts for failed network fetches
    pub fetch_retries: u32,

    /// Base delay between network fetch attempts (multiplied by attempt number)
    pub retry_backoff_ms: u64,

    /// Origins allowed by the CORS layer
    pub allowed_origins: Vec<String>,

    /// Request body limit
    pub max_body_bytes: usize,

    /// Largest canvas (width * height) a scene may declare
    pub max_canvas_pixels: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            assets_dir: PathBuf::from("./assets"),
            work_dir: PathBuf::from("./tmp"),
            static_dir: None,
            fonts_dir: None,
            jpeg_quality: 1.0,
            asset_timeout_secs: 10,
            render_timeout_secs: 60,
            fetch_retries: 2,
            retry_backoff_ms: 200,
            allowed_origins: vec!["http://localhost:8080".to_string()],
            max_body_bytes: 10 * 1024 * 1024,
            max_canvas_pixels: 40_000_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment: the YAML file named by
    /// CONFIG_FILE (if any), then path overrides from env vars.
    pub fn from_env() -> Self {
        let config_file = std::env::var("CONFIG_FILE").ok().map(PathBuf::from);
        Self::load(config_file.as_deref()).with_overrides(|key| std::env::var(key).ok())
    }

    /// Load configuration from a YAML file, falling back to defaults when the
    /// file is absent or invalid.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        origins = config.allowed_origins.len(),
                        "Loaded configuration"
                    );
                    config.sanitized()
                }
                Err(e) => {
                    tracing::warn!(%e, path = %path.display(), "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Apply BIND_ADDR / ASSETS_DIR / WORK_DIR / STATIC_DIR / FONTS_DIR
    /// overrides from the given lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(dir) = lookup("ASSETS_DIR") {
            self.assets_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("FONTS_DIR") {
            self.fonts_dir = Some(PathBuf::from(dir));
        }
        self
    }

    fn sanitized(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.jpeg_quality) {
            tracing::warn!(
                quality = self.jpeg_quality,
                "jpeg_quality out of range, clamping to 0.0..=1.0"
            );
            self.jpeg_quality = self.jpeg_quality.clamp(0.0, 1.0);
        }
        self
    }

    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.asset_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
