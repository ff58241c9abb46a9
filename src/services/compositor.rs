//! Render pipeline: scene + attributes -> JPEG (and optionally PDF/PNG file).
//!
//! Stages run strictly in order on an exclusively owned working copy of the
//! scene ([`Surface`]):
//!
//! 1. load remote scene images into the asset cache
//! 2. resample a canvas-sized background to exactly the canvas size
//! 3. bind placeholders (logos, then text)
//! 4. replace the barcode placeholder group with the barcode image
//! 5. flatten to a raster
//!
//! Any failure outside stage 3 aborts the render; stage 3 failures become
//! warnings on the result.

use base64::Engine;
use futures_util::future::join_all;
use image::imageops::FilterType;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RenderError;
use crate::models::{AppConfig, AttributeError, AttributeMap, ImageNode, SceneDocument, SceneNode};
use crate::rendering::{raster_to_pdf, scene_to_svg, AssetCache, SvgRenderer};
use crate::services::asset_binder::{AssetBinder, RenderWarning};
use crate::services::asset_fetcher::{
    decode_data_uri, fetch_with_timeout, AssetError, AssetFetcher, HttpAssetFetcher, LoadedAsset,
};
use crate::services::barcode::find_barcode;
use crate::services::temp_store::TempStore;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Background resize failed: {0}")]
    BackgroundResize(String),

    #[error("Failed to load asset {source_ref}: {message}")]
    AssetLoad { source_ref: String, message: String },

    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AttributeError> for ComposeError {
    fn from(e: AttributeError) -> Self {
        ComposeError::MalformedInput(e.to_string())
    }
}

impl From<serde_json::Error> for ComposeError {
    fn from(e: serde_json::Error) -> Self {
        ComposeError::MalformedInput(format!("scene: {e}"))
    }
}

impl ComposeError {
    fn asset_load(source_ref: &str, error: AssetError) -> Self {
        ComposeError::AssetLoad {
            source_ref: source_ref.to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompositorSettings {
    /// JPEG quality in 0.0..=1.0
    pub jpeg_quality: f32,
    pub asset_timeout: Duration,
    pub render_timeout: Duration,
    /// Upper bound on `width * height` of a scene
    pub max_canvas_pixels: u64,
}

impl CompositorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            asset_timeout: config.asset_timeout(),
            render_timeout: config.render_timeout(),
            max_canvas_pixels: config.max_canvas_pixels,
        }
    }
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Also wrap the raster in a one-page PDF
    pub emit_pdf: bool,
    /// Also store the raster as a PNG in the temporary store
    pub rasterize_to_file: bool,
}

/// The working copy a render threads through its stages.
#[derive(Debug)]
pub struct Surface {
    document: SceneDocument,
    assets: AssetCache,
    warnings: Vec<RenderWarning>,
}

impl Surface {
    fn new(document: SceneDocument) -> Self {
        Self {
            document,
            assets: AssetCache::new(),
            warnings: Vec::new(),
        }
    }

    pub fn document(&self) -> &SceneDocument {
        &self.document
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    pub fn warnings(&self) -> &[RenderWarning] {
        &self.warnings
    }
}

/// Output of one render.
#[derive(Debug)]
pub struct RenderedAsset {
    pub jpeg: Vec<u8>,
    pub pdf: Option<Vec<u8>>,
    pub file: Option<PathBuf>,
    pub warnings: Vec<RenderWarning>,
    /// The bound scene that was flattened
    pub scene: SceneDocument,
}

impl RenderedAsset {
    pub fn image_data_uri(&self) -> String {
        data_uri("image/jpeg", &self.jpeg)
    }

    pub fn pdf_data_uri(&self) -> Option<String> {
        self.pdf.as_deref().map(|pdf| data_uri("application/pdf", pdf))
    }
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

pub struct Compositor {
    fetcher: Arc<dyn AssetFetcher>,
    binder: AssetBinder,
    renderer: Arc<SvgRenderer>,
    temp_store: TempStore,
    settings: CompositorSettings,
}

impl Compositor {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        renderer: Arc<SvgRenderer>,
        temp_store: TempStore,
        settings: CompositorSettings,
    ) -> Self {
        let binder = AssetBinder::new(fetcher.clone(), settings.asset_timeout);
        Self {
            fetcher,
            binder,
            renderer,
            temp_store,
            settings,
        }
    }

    /// Build a compositor with the HTTP/filesystem fetcher and fonts named by
    /// `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, AssetError> {
        let fetcher = HttpAssetFetcher::new(
            &config.assets_dir,
            config.asset_timeout(),
            config.fetch_retries,
            config.retry_backoff(),
        )?;
        let renderer = SvgRenderer::from_fonts_dir(config.fonts_dir.as_deref());
        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(renderer),
            TempStore::new(&config.work_dir),
            CompositorSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// Run the full pipeline under the render timeout. `document` is never
    /// mutated.
    pub async fn render(
        &self,
        document: &SceneDocument,
        attributes: &AttributeMap,
        options: RenderOptions,
    ) -> Result<RenderedAsset, ComposeError> {
        let limit = self.settings.render_timeout;
        tokio::time::timeout(limit, async {
            let surface = self.compose(document, attributes).await?;
            self.flatten(surface, options).await
        })
        .await
        .map_err(|_| ComposeError::Timeout(limit))?
    }

    /// Stages 1-4: produce the bound working surface without flattening it.
    pub async fn compose(
        &self,
        document: &SceneDocument,
        attributes: &AttributeMap,
    ) -> Result<Surface, ComposeError> {
        self.check_canvas(document)?;
        let surface = self.load(document.clone()).await?;
        let surface = self.resize_background(surface).await?;
        let surface = self.bind(surface, attributes).await;
        self.place_barcode(surface, attributes).await
    }

    /// Reject canvases whose raster would exceed the configured pixel budget,
    /// before any stage allocates one.
    fn check_canvas(&self, document: &SceneDocument) -> Result<(), ComposeError> {
        let pixels = u64::from(document.width) * u64::from(document.height);
        if pixels > self.settings.max_canvas_pixels {
            return Err(ComposeError::MalformedInput(format!(
                "canvas {}x{} exceeds the limit of {} pixels",
                document.width, document.height, self.settings.max_canvas_pixels
            )));
        }
        Ok(())
    }

    async fn load(&self, document: SceneDocument) -> Result<Surface, ComposeError> {
        let mut sources = Vec::new();
        let mut seen = HashSet::new();
        if let Some(background) = &document.background_image {
            collect_source(&background.src, &mut seen, &mut sources);
        }
        collect_image_sources(&document.objects, &mut seen, &mut sources);

        tracing::debug!(
            width = document.width,
            height = document.height,
            objects = document.objects.len(),
            images = sources.len(),
            "Loading scene"
        );

        let fetcher = self.fetcher.as_ref();
        let timeout = self.settings.asset_timeout;
        let results = join_all(sources.into_iter().map(|src| async move {
            let result = fetch_with_timeout(fetcher, &src, timeout).await;
            (src, result)
        }))
        .await;

        let mut surface = Surface::new(document);
        for (src, result) in results {
            let asset = result.map_err(|e| ComposeError::asset_load(&src, e))?;
            surface.assets.insert(src, Arc::new(asset));
        }
        Ok(surface)
    }

    async fn resize_background(&self, mut surface: Surface) -> Result<Surface, ComposeError> {
        let (width, height) = (surface.document.width, surface.document.height);
        let Some(background) = surface.document.background_image.as_ref() else {
            return Ok(surface);
        };
        if background.width != f64::from(width) || background.height != f64::from(height) {
            return Ok(surface);
        }

        let bytes = if background.src.starts_with("data:") {
            decode_data_uri(&background.src)
                .map_err(|e| ComposeError::BackgroundResize(e.to_string()))?
        } else {
            surface
                .assets
                .get(&background.src)
                .map(|asset| asset.bytes.clone())
                .ok_or_else(|| {
                    ComposeError::BackgroundResize(format!("{} was not loaded", background.src))
                })?
        };

        tracing::debug!(width, height, "Resampling background to canvas size");
        let png = tokio::task::spawn_blocking(move || resample_to_png(&bytes, width, height))
            .await
            .map_err(|e| ComposeError::Internal(format!("Resize task failed: {e}")))??;

        let resized = LoadedAsset {
            bytes: png,
            mime: "image/png",
            width,
            height,
        };
        surface.document.background_image = Some(ImageNode::placed(
            resized.to_data_uri(),
            0.0,
            0.0,
            width,
            height,
            1.0,
        ));
        Ok(surface)
    }

    async fn bind(&self, surface: Surface, attributes: &AttributeMap) -> Surface {
        let Surface {
            document,
            mut assets,
            mut warnings,
        } = surface;

        let bound = self.binder.bind(document, attributes).await;
        assets.extend(bound.assets);
        warnings.extend(bound.warnings);

        Surface {
            document: bound.document,
            assets,
            warnings,
        }
    }

    async fn place_barcode(
        &self,
        mut surface: Surface,
        attributes: &AttributeMap,
    ) -> Result<Surface, ComposeError> {
        let Some((index, transform)) = find_barcode(&surface.document.objects) else {
            return Ok(surface);
        };
        let Some(src) = attributes.barcode() else {
            tracing::debug!("Barcode placeholder present but no barcode attribute, leaving it");
            return Ok(surface);
        };

        let asset = match surface.assets.get(src) {
            Some(asset) => asset.clone(),
            None => {
                let loaded = fetch_with_timeout(self.fetcher.as_ref(), src, self.settings.asset_timeout)
                    .await
                    .map_err(|e| ComposeError::asset_load(src, e))?;
                Arc::new(loaded)
            }
        };

        let scale = transform.image_scale(asset.width, asset.height);
        let mut image = ImageNode::placed(
            src,
            transform.left,
            transform.top,
            asset.width,
            asset.height,
            scale,
        );
        image.angle = transform.angle;

        tracing::debug!(
            left = transform.left,
            top = transform.top,
            angle = transform.angle,
            scale,
            "Placing barcode"
        );

        surface.document.objects.remove(index);
        surface.document.objects.push(SceneNode::Image(image));
        surface.assets.insert(src.to_string(), asset);
        Ok(surface)
    }

    async fn flatten(
        &self,
        surface: Surface,
        options: RenderOptions,
    ) -> Result<RenderedAsset, ComposeError> {
        let Surface {
            document,
            assets,
            warnings,
        } = surface;

        let svg = scene_to_svg(&document, &assets);
        let renderer = self.renderer.clone();
        let quality = self.settings.jpeg_quality;
        let (width, height) = (document.width, document.height);

        let (jpeg, pdf, png) = tokio::task::spawn_blocking(move || {
            let raster = renderer.rasterize(svg.as_bytes(), width, height)?;
            let jpeg = raster.encode_jpeg(quality)?;
            let pdf = if options.emit_pdf {
                Some(raster_to_pdf(&raster, "Ticket")?)
            } else {
                None
            };
            let png = if options.rasterize_to_file {
                Some(raster.encode_png()?)
            } else {
                None
            };
            Ok::<_, RenderError>((jpeg, pdf, png))
        })
        .await
        .map_err(|e| ComposeError::Internal(format!("Render task failed: {e}")))??;

        let file = match png {
            Some(png) => Some(
                self.temp_store
                    .save_png(&png)
                    .await
                    .map_err(RenderError::from)?,
            ),
            None => None,
        };

        tracing::debug!(
            jpeg_bytes = jpeg.len(),
            pdf = pdf.is_some(),
            warnings = warnings.len(),
            "Render complete"
        );

        Ok(RenderedAsset {
            jpeg,
            pdf,
            file,
            warnings,
            scene: document,
        })
    }
}

fn collect_source(src: &str, seen: &mut HashSet<String>, sources: &mut Vec<String>) {
    if !src.is_empty() && !src.starts_with("data:") && seen.insert(src.to_string()) {
        sources.push(src.to_string());
    }
}

fn collect_image_sources(nodes: &[SceneNode], seen: &mut HashSet<String>, sources: &mut Vec<String>) {
    for node in nodes {
        match node {
            SceneNode::Image(image) => collect_source(&image.src, seen, sources),
            SceneNode::Group(group) => collect_image_sources(&group.objects, seen, sources),
            _ => {}
        }
    }
}

/// Decode, stretch to exactly `width` x `height` and re-encode as PNG.
fn resample_to_png(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ComposeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| ComposeError::BackgroundResize(e.to_string()))?;
    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| ComposeError::BackgroundResize(e.to_string()))?;
    Ok(out.into_inner())
}
