//! Scene document model.
//!
//! Mirrors the JSON produced by the canvas editor: a canvas size, an optional
//! background image and an ordered list of objects. Field names follow the
//! editor's camelCase JSON; node kinds are selected by the `type` tag.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Literal text of the label child that marks a barcode placeholder group.
pub const BARCODE_LABEL: &str = "Barcode";

/// A serialized template: canvas size, background and ordered objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    #[serde(deserialize_with = "de_dimension")]
    pub width: u32,
    #[serde(deserialize_with = "de_dimension")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<ImageNode>,
    #[serde(default)]
    pub objects: Vec<SceneNode>,
}

impl SceneDocument {
    /// Parse a scene from a request field.
    ///
    /// Accepts the document itself or a JSON string holding it (the editor
    /// posts `JSON.stringify(scene)` inside a form field).
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::String(raw) => serde_json::from_str(&raw),
            other => serde_json::from_value(other),
        }
    }
}

/// One drawable object of the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SceneNode {
    #[serde(rename = "i-text", alias = "text", alias = "textbox")]
    Text(TextNode),
    #[serde(rename = "image")]
    Image(ImageNode),
    #[serde(rename = "rect")]
    Rect(RectNode),
    #[serde(rename = "group")]
    Group(GroupNode),
    /// Any object type the compositor does not draw (paths, circles, ...).
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub font_weight: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub font_style: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub text_decoration: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub text_align: Option<String>,
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default = "default_fill", deserialize_with = "de_opt_string")]
    pub fill: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub background_color: Option<String>,
}

impl TextNode {
    pub fn new(text: impl Into<String>, left: f64, top: f64) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            font_family: default_font_family(),
            font_size: default_font_size(),
            font_weight: None,
            font_style: None,
            text_decoration: None,
            text_align: None,
            line_height: default_line_height(),
            fill: default_fill(),
            stroke: None,
            stroke_width: 0.0,
            background_color: None,
        }
    }

    pub fn is_barcode_label(&self) -> bool {
        self.text == BARCODE_LABEL
    }
}

/// A raster image; `width`/`height` are the natural pixel size, drawn at
/// `width * scale_x` by `height * scale_y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageNode {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "one")]
    pub opacity: f64,
}

impl ImageNode {
    /// An image of natural size `width` x `height` placed at (`left`, `top`)
    /// with a uniform scale.
    pub fn placed(
        src: impl Into<String>,
        left: f64,
        top: f64,
        width: u32,
        height: u32,
        scale: f64,
    ) -> Self {
        Self {
            src: src.into(),
            left,
            top,
            width: f64::from(width),
            height: f64::from(height),
            scale_x: scale,
            scale_y: scale,
            angle: 0.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectNode {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "default_fill", deserialize_with = "de_opt_string")]
    pub fill: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: f64,
}

/// A group of objects. Child positions are relative to the group centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default)]
    pub objects: Vec<SceneNode>,
}

impl GroupNode {
    /// A group is the barcode placeholder iff it has exactly two children and
    /// the second is a text node reading exactly "Barcode".
    pub fn is_barcode_placeholder(&self) -> bool {
        matches!(
            self.objects.as_slice(),
            [_, SceneNode::Text(label)] if label.is_barcode_label()
        )
    }
}

/// Objects without an explicit fill are painted black; `null` or `""` means
/// no fill.
fn default_fill() -> Option<String> {
    Some("rgb(0,0,0)".to_string())
}

fn one() -> f64 {
    1.0
}

fn default_font_family() -> String {
    "Times New Roman".to_string()
}

fn default_font_size() -> f64 {
    40.0
}

fn default_line_height() -> f64 {
    1.16
}

/// Canvas dimensions arrive as numbers or numeric strings; fractions are
/// truncated and the result must be positive.
fn de_dimension<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_number(s),
        _ => None,
    };
    match parsed {
        Some(v) if v >= 1.0 && v <= f64::from(u32::MAX) => Ok(v.trunc() as u32),
        _ => Err(D::Error::custom(format!(
            "invalid canvas dimension: {value}"
        ))),
    }
}

/// Leading integer of a string, the way `parseInt` reads "300px" as 300.
fn parse_leading_number(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..end].parse::<i64>().ok().map(|v| v as f64)
}

/// Style attributes may be strings, numbers (`fontWeight: 700`) or null.
fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}
