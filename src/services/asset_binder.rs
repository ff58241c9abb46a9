//! Placeholder-to-asset binding.
//!
//! Each top-level text node (except the barcode label) is resolved against
//! the `logos` namespace first. A result that is an image reference turns the
//! node into an image; anything else is resolved against the full attribute
//! map and kept as text.

use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::models::{AttributeMap, ImageNode, SceneDocument, SceneNode, TextNode};
use crate::services::asset_fetcher::{
    fetch_with_timeout, is_image_reference, AssetFetcher, LoadedAsset,
};
use crate::services::token_resolver;

/// Scale applied to logo images placed in place of text nodes.
pub const LOGO_SCALE: f64 = 0.4;

/// A recoverable per-node problem reported beside a successful render.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RenderWarning {
    /// Index of the affected object in the scene
    pub node_index: usize,
    /// Asset reference that failed
    pub source: String,
    /// What went wrong
    pub message: String,
}

/// A scene with placeholders bound, plus the assets it now references.
#[derive(Debug)]
pub struct BoundDocument {
    pub document: SceneDocument,
    pub assets: HashMap<String, Arc<LoadedAsset>>,
    pub warnings: Vec<RenderWarning>,
}

pub struct AssetBinder {
    fetcher: Arc<dyn AssetFetcher>,
    timeout: Duration,
}

impl AssetBinder {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Bind placeholders in `document` (a working copy owned by the caller).
    ///
    /// Logo loads run concurrently and are all joined before this returns.
    /// A failed load leaves that node as text and records a warning.
    pub async fn bind(&self, mut document: SceneDocument, attributes: &AttributeMap) -> BoundDocument {
        let mut logo_jobs = Vec::new();

        for (index, node) in document.objects.iter_mut().enumerate() {
            let SceneNode::Text(text) = node else {
                continue;
            };
            if text.is_barcode_label() {
                continue;
            }

            if attributes.has_logos() {
                let candidate = token_resolver::resolve(&text.text, attributes.logos());
                if is_image_reference(&candidate, self.fetcher.as_ref()).await {
                    logo_jobs.push((index, candidate));
                    continue;
                }
            }
            text.text = token_resolver::resolve(&text.text, attributes.values());
        }

        tracing::debug!(logos = logo_jobs.len(), "Loading placeholder logos");

        let fetcher = self.fetcher.as_ref();
        let timeout = self.timeout;
        let results = join_all(logo_jobs.into_iter().map(|(index, src)| async move {
            let result = fetch_with_timeout(fetcher, &src, timeout).await;
            (index, src, result)
        }))
        .await;

        let mut assets = HashMap::new();
        let mut warnings = Vec::new();
        for (index, src, result) in results {
            let SceneNode::Text(text) = &mut document.objects[index] else {
                continue;
            };
            match result {
                Ok(asset) => {
                    let image = logo_image(text, &src, &asset);
                    document.objects[index] = SceneNode::Image(image);
                    assets.insert(src, Arc::new(asset));
                }
                Err(e) => {
                    tracing::warn!(node = index, source = %src, error = %e, "Logo load failed, keeping text");
                    text.text = token_resolver::resolve(&text.text, attributes.values());
                    warnings.push(RenderWarning {
                        node_index: index,
                        source: src,
                        message: e.to_string(),
                    });
                }
            }
        }

        BoundDocument {
            document,
            assets,
            warnings,
        }
    }
}

fn logo_image(text: &TextNode, src: &str, asset: &LoadedAsset) -> ImageNode {
    ImageNode::placed(
        src,
        text.left,
        text.top,
        asset.width,
        asset.height,
        LOGO_SCALE,
    )
}
