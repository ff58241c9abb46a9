//! Image asset loading for logos, barcodes and scene images.
//!
//! Sources are data URIs, absolute `http`/`https` URLs, or paths inside the
//! local asset store. Network fetches are retried with linear backoff; every
//! load is bounded by a timeout at the call site.

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Extensions that mark a resolved placeholder value as an image reference.
const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "gif", "png"];

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Invalid asset reference: {0}")]
    InvalidReference(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// A fetched image: encoded bytes plus the facts needed to place it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

impl LoadedAsset {
    /// Sniff the format and read the pixel size without decoding pixels.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AssetError> {
        let format =
            image::guess_format(&bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
        let (width, height) = image::ImageReader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|e| AssetError::Decode(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(AssetError::Decode("image has zero size".to_string()));
        }
        Ok(Self {
            bytes,
            mime: format.to_mime_type(),
            width,
            height,
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Source of image assets.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Load and sniff the asset named by `src`.
    async fn fetch(&self, src: &str) -> Result<LoadedAsset, AssetError>;

    /// Whether `path` names an existing file in the local asset store.
    async fn has_local_asset(&self, path: &str) -> bool;
}

/// Whether a resolved placeholder value should become an image: it must end
/// in an image extension and be either an absolute URL or an existing local
/// asset.
pub async fn is_image_reference(value: &str, fetcher: &dyn AssetFetcher) -> bool {
    if !has_image_extension(value) {
        return false;
    }
    is_absolute_url(value) || fetcher.has_local_asset(value).await
}

pub fn has_image_extension(value: &str) -> bool {
    value
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Absolute `ftp`/`http`/`https` URL with a host and no whitespace.
pub fn is_absolute_url(value: &str) -> bool {
    let pattern = URL_PATTERN.get_or_init(|| {
        Regex::new(r"^(?i:ftp|https?)://[^\s/?#]+(?:[/?#]\S*)?$").expect("url pattern is valid")
    });
    pattern.is_match(value) && reqwest::Url::parse(value).is_ok()
}

/// Decode a base64 `data:` URI into its payload bytes.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::InvalidReference("not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::InvalidReference("data URI without payload".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(AssetError::InvalidReference(
            "only base64 data URIs are supported".to_string(),
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AssetError::InvalidReference(format!("bad base64 payload: {e}")))
}

/// Run one fetch under a timeout.
pub async fn fetch_with_timeout(
    fetcher: &dyn AssetFetcher,
    src: &str,
    timeout: Duration,
) -> Result<LoadedAsset, AssetError> {
    tokio::time::timeout(timeout, fetcher.fetch(src))
        .await
        .map_err(|_| AssetError::Timeout(timeout))?
}

/// Fetcher backed by `reqwest` for URLs and a directory for local paths.
pub struct HttpAssetFetcher {
    client: reqwest::Client,
    assets_dir: PathBuf,
    retries: u32,
    backoff: Duration,
}

impl HttpAssetFetcher {
    pub fn new(
        assets_dir: impl Into<PathBuf>,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
    ) -> Result<Self, AssetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            assets_dir: assets_dir.into(),
            retries,
            backoff,
        })
    }

    /// Map a store-relative path to a file under the asset root. Parent
    /// directory components are rejected so lookups cannot leave the store.
    fn local_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.assets_dir.join(relative))
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    attempt += 1;
                    tracing::debug!(%url, attempt, error = %e, "Retrying asset fetch");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

fn is_retryable(error: &AssetError) -> bool {
    match error {
        AssetError::Transport(_) => true,
        AssetError::Status { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, src: &str) -> Result<LoadedAsset, AssetError> {
        let src = src.trim();
        let bytes = if src.starts_with("data:") {
            decode_data_uri(src)?
        } else if is_absolute_url(src) {
            if src.get(..4).is_some_and(|s| s.eq_ignore_ascii_case("ftp:")) {
                return Err(AssetError::UnsupportedScheme(src.to_string()));
            }
            tracing::debug!(url = %src, "Fetching remote asset");
            self.fetch_remote(src).await?
        } else {
            let path = self
                .local_path(src)
                .ok_or_else(|| AssetError::InvalidReference(src.to_string()))?;
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(AssetError::NotFound(src.to_string()));
            }
            tracing::trace!(path = %path.display(), "Loading asset from filesystem");
            tokio::fs::read(&path).await?
        };
        LoadedAsset::from_bytes(bytes)
    }

    async fn has_local_asset(&self, path: &str) -> bool {
        let Some(path) = self.local_path(path) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file())
    }
}
