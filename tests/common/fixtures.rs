//! Test fixtures: scenes, attribute maps and generated images.

use base64::Engine;
use serde_json::{json, Value};
use std::io::Cursor;

/// Encode a solid-colour PNG
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

pub fn png_data_uri(width: u32, height: u32, rgb: [u8; 3]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height, rgb))
    )
}

/// A text node as the editor serializes it
pub fn text(text: &str, left: f64, top: f64) -> Value {
    json!({
        "type": "i-text",
        "text": text,
        "left": left,
        "top": top,
        "fontSize": 20,
        "fontFamily": "Times New Roman",
        "fill": "#000000",
    })
}

/// The editor's barcode placeholder: a stroked frame and a "Barcode" label,
/// grouped at (`left`, `top`)
pub fn barcode_group(left: f64, top: f64, angle: f64, label: &str) -> Value {
    json!({
        "type": "group",
        "left": left,
        "top": top,
        "width": 303,
        "height": 106,
        "angle": angle,
        "scaleX": 1,
        "scaleY": 1,
        "objects": [
            {
                "type": "rect",
                "left": -151.5,
                "top": -53,
                "width": 297,
                "height": 100,
                "strokeWidth": 3,
                "stroke": "#000",
                "fill": "transparent"
            },
            {"type": "i-text", "text": label, "left": -40, "top": -12, "fontSize": 20}
        ]
    })
}

pub fn scene(width: u32, height: u32, objects: Vec<Value>) -> Value {
    json!({"width": width, "height": height, "objects": objects})
}

/// `JSON.stringify(JSON.stringify(attributes))`, as the legacy client posts
pub fn double_encoded(attributes: &Value) -> String {
    serde_json::to_string(&attributes.to_string()).expect("string encodes")
}
