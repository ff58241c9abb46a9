//! Single-page PDF wrapping of a flattened raster.
//!
//! The page is the raster size at 72 DPI, so one pixel is one point, with the
//! image placed at the origin.

use crate::error::RenderError;
use crate::rendering::Raster;
use printpdf::{
    ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
};
use std::io::{BufWriter, Cursor};

const PT_TO_MM: f32 = 0.352_777_78;

pub fn raster_to_pdf(raster: &Raster, title: &str) -> Result<Vec<u8>, RenderError> {
    let (width, height) = (raster.width(), raster.height());
    let (doc, page, layer) = PdfDocument::new(
        title,
        Mm(width as f32 * PT_TO_MM),
        Mm(height as f32 * PT_TO_MM),
        "Layer 1",
    );
    let layer = doc.get_page(page).get_layer(layer);

    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: raster.to_rgb().into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });
    image.add_to_layer(
        layer,
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(72.0),
            ..Default::default()
        },
    );

    let mut writer = BufWriter::new(Cursor::new(Vec::new()));
    doc.save(&mut writer)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let cursor = writer
        .into_inner()
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    Ok(cursor.into_inner())
}
