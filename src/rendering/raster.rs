use crate::error::RenderError;
use image::{codecs::jpeg::JpegEncoder, RgbImage};
use resvg::usvg::{self, Transform};
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;

/// Rasterizes scene SVG over a white canvas.
pub struct SvgRenderer {
    /// Font database for text rendering
    fontdb: Arc<fontdb::Database>,
}

impl SvgRenderer {
    /// Create a renderer with the given font files loaded ahead of system fonts
    pub fn with_fonts(fonts: Vec<(String, Vec<u8>)>) -> Self {
        let mut fontdb = fontdb::Database::new();

        for (name, data) in fonts {
            fontdb.load_font_data(data);
            tracing::debug!(font = %name, "Loaded font");
        }

        // Load system fonts as fallback
        fontdb.load_system_fonts();

        tracing::info!(
            font_count = fontdb.len(),
            "Loaded fonts for SVG text rendering"
        );

        Self {
            fontdb: Arc::new(fontdb),
        }
    }

    /// Create a renderer loading every font file in `dir` (if given).
    pub fn from_fonts_dir(dir: Option<&Path>) -> Self {
        Self::with_fonts(dir.map(read_font_files).unwrap_or_default())
    }

    /// Create a new SVG renderer with no custom fonts (system fonts only)
    pub fn new() -> Self {
        Self::with_fonts(Vec::new())
    }

    /// Parse and rasterize SVG at `width` x `height`.
    pub fn rasterize(&self, svg_data: &[u8], width: u32, height: u32) -> Result<Raster, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::UnsupportedDimensions { width, height });
        }

        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_data(svg_data, &options)
            .map_err(|e| RenderError::SvgParse(e.to_string()))?;

        let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::PixmapAllocation)?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let svg_size = tree.size();
        let transform = Transform::from_scale(
            width as f32 / svg_size.width(),
            height as f32 / svg_size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        Ok(Raster { pixmap })
    }
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// A flattened scene.
pub struct Raster {
    pixmap: Pixmap,
}

impl Raster {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Opaque RGB pixels, composited over white.
    pub fn to_rgb(&self) -> RgbImage {
        RgbImage::from_raw(self.width(), self.height(), rgba_to_rgb_over_white(self.pixmap.data()))
            .unwrap_or_else(|| RgbImage::new(self.width(), self.height()))
    }

    /// Encode as baseline JPEG. `quality` is in 0.0..=1.0.
    pub fn encode_jpeg(&self, quality: f32) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
            .encode_image(&self.to_rgb())
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(out)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        self.pixmap
            .encode_png()
            .map_err(|e| RenderError::Encode(e.to_string()))
    }
}

/// Map a 0.0..=1.0 quality to the encoder's 1..=100 scale.
fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

fn read_font_files(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "Fonts directory not readable");
        return Vec::new();
    };

    entries
        .flatten()
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "ttf" | "otf" | "ttc"))
        })
        .filter_map(|entry| {
            let data = std::fs::read(entry.path()).ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            tracing::trace!(font = %name, "Loading font from filesystem");
            Some((name, data))
        })
        .collect()
}

/// Convert premultiplied RGBA pixel data to RGB, compositing against white.
fn rgba_to_rgb_over_white(rgba_data: &[u8]) -> Vec<u8> {
    rgba_data
        .chunks_exact(4)
        .flat_map(|pixel| {
            let (r, g, b, a) = (pixel[0], pixel[1], pixel[2], pixel[3]);
            if a == 255 {
                [r, g, b]
            } else {
                // Premultiplied: c_out = c + 255 * (1 - a)
                let white = 255 - a;
                [
                    r.saturating_add(white),
                    g.saturating_add(white),
                    b.saturating_add(white),
                ]
            }
        })
        .collect()
}
