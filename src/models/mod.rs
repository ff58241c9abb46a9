pub mod attributes;
pub mod config;
pub mod scene;

pub use attributes::{AttributeError, AttributeMap};
pub use config::AppConfig;
pub use scene::{
    GroupNode, ImageNode, RectNode, SceneDocument, SceneNode, TextNode, BARCODE_LABEL,
};
