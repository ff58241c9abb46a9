pub mod pdf;
pub mod raster;
pub mod scene_svg;

pub use pdf::raster_to_pdf;
pub use raster::{Raster, SvgRenderer};
pub use scene_svg::{scene_to_svg, AssetCache};
