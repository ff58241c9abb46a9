pub mod asset_binder;
pub mod asset_fetcher;
pub mod barcode;
pub mod compositor;
pub mod temp_store;
pub mod token_resolver;

pub use asset_binder::{AssetBinder, BoundDocument, RenderWarning};
pub use asset_fetcher::{AssetError, AssetFetcher, HttpAssetFetcher, LoadedAsset};
pub use barcode::{find_barcode, place_barcode, BarcodeTransform};
pub use compositor::{
    ComposeError, Compositor, CompositorSettings, RenderOptions, RenderedAsset, Surface,
};
pub use temp_store::TempStore;
