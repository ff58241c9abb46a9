//! Server-local temporary rasters (`temp_XXXXX.png`).
//!
//! Names carry five random alphanumerics, so collisions are unlikely but
//! possible; an existing file with the drawn name is overwritten.

use std::path::{Path, PathBuf};

const ID_LEN: usize = 5;

#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `png` under a fresh name and return its path.
    pub async fn save_png(&self, png: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(temp_name());
        tokio::fs::write(&path, png).await?;
        tracing::debug!(path = %path.display(), bytes = png.len(), "Stored temporary raster");
        Ok(path)
    }
}

/// `temp_` + five random alphanumerics + `.png`.
pub fn temp_name() -> String {
    use rand::Rng;
    let id: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect();
    format!("temp_{id}.png")
}
