//! Scene document to SVG.
//!
//! Node geometry follows the canvas editor: `left`/`top` is the unrotated
//! top-left corner of the object and the pivot for `angle` (degrees,
//! clockwise). Children of a group are positioned relative to the group
//! centre.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::models::{GroupNode, ImageNode, RectNode, SceneDocument, SceneNode, TextNode};
use crate::services::asset_fetcher::LoadedAsset;

/// Line box height relative to font size, as the editor measures it.
const FONT_SIZE_MULT: f64 = 1.13;
/// Baseline of the first line, relative to font size.
const BASELINE: f64 = 0.89;
/// Rough glyph advance used to size text backgrounds and alignment.
const AVG_CHAR_WIDTH: f64 = 0.6;

/// Image bytes resolved for scene sources that are not data URIs.
pub type AssetCache = HashMap<String, Arc<LoadedAsset>>;

/// Build an SVG document for `document`. Images whose source is neither a
/// data URI nor present in `assets` are left out.
pub fn scene_to_svg(document: &SceneDocument, assets: &AssetCache) -> String {
    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = document.width,
        h = document.height,
    );

    if let Some(background) = &document.background_image {
        write_image(&mut out, background, assets);
    }
    for node in &document.objects {
        write_node(&mut out, node, assets);
    }

    out.push_str("</svg>");
    out
}

fn write_node(out: &mut String, node: &SceneNode, assets: &AssetCache) {
    match node {
        SceneNode::Text(text) => write_text(out, text),
        SceneNode::Image(image) => write_image(out, image, assets),
        SceneNode::Rect(rect) => write_rect(out, rect),
        SceneNode::Group(group) => write_group(out, group, assets),
        SceneNode::Unsupported => {}
    }
}

/// Open a `<g>` placing local (0,0) at `left`/`top`, rotated then scaled.
fn open_object(out: &mut String, left: f64, top: f64, angle: f64, sx: f64, sy: f64, opacity: f64) {
    let _ = write!(out, r#"<g transform="translate({left} {top})"#);
    if angle != 0.0 {
        let _ = write!(out, " rotate({angle})");
    }
    if sx != 1.0 || sy != 1.0 {
        let _ = write!(out, " scale({sx} {sy})");
    }
    out.push('"');
    if opacity < 1.0 {
        let _ = write!(out, r#" opacity="{}""#, opacity.max(0.0));
    }
    out.push('>');
}

fn write_text(out: &mut String, text: &TextNode) {
    open_object(out, text.left, text.top, text.angle, text.scale_x, text.scale_y, text.opacity);

    let lines: Vec<&str> = text.text.split('\n').collect();
    let line_advance = text.font_size * text.line_height * FONT_SIZE_MULT;
    let box_width = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0) as f64
        * text.font_size
        * AVG_CHAR_WIDTH;

    if let Some(bg) = paint(text.background_color.as_deref()) {
        let box_height = line_advance * lines.len() as f64;
        let _ = write!(
            out,
            r#"<rect width="{box_width}" height="{box_height}" fill="{}"/>"#,
            escape(bg)
        );
    }

    let (anchor, x) = match text.text_align.as_deref() {
        Some("center") => ("middle", box_width / 2.0),
        Some("right") => ("end", box_width),
        _ => ("start", 0.0),
    };

    let _ = write!(
        out,
        r#"<text xml:space="preserve" font-family="{}" font-size="{}" text-anchor="{anchor}" fill="{}""#,
        escape(&text.font_family),
        text.font_size,
        escape(paint(text.fill.as_deref()).unwrap_or("none")),
    );
    if let Some(weight) = &text.font_weight {
        let _ = write!(out, r#" font-weight="{}""#, escape(weight));
    }
    if let Some(style) = &text.font_style {
        let _ = write!(out, r#" font-style="{}""#, escape(style));
    }
    if let Some(decoration) = text.text_decoration.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(out, r#" text-decoration="{}""#, escape(decoration));
    }
    if let Some(stroke) = paint(text.stroke.as_deref()) {
        if text.stroke_width > 0.0 {
            let _ = write!(
                out,
                r#" stroke="{}" stroke-width="{}""#,
                escape(stroke),
                text.stroke_width
            );
        }
    }
    out.push('>');

    for (i, line) in lines.iter().enumerate() {
        let y = text.font_size * BASELINE + line_advance * i as f64;
        let _ = write!(out, r#"<tspan x="{x}" y="{y}">{}</tspan>"#, escape(line));
    }

    out.push_str("</text></g>");
}

fn write_image(out: &mut String, image: &ImageNode, assets: &AssetCache) {
    let href = if image.src.starts_with("data:") {
        image.src.clone()
    } else if let Some(asset) = assets.get(&image.src) {
        asset.to_data_uri()
    } else {
        tracing::debug!(src = %image.src, "Skipping image without loaded source");
        return;
    };

    open_object(out, image.left, image.top, image.angle, image.scale_x, image.scale_y, image.opacity);
    let _ = write!(
        out,
        r#"<image width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"/></g>"#,
        image.width,
        image.height,
        escape(&href)
    );
}

fn write_rect(out: &mut String, rect: &RectNode) {
    open_object(out, rect.left, rect.top, rect.angle, rect.scale_x, rect.scale_y, rect.opacity);

    // The stroke is centred on the edge, so the outline starts half a stroke in
    let inset = match paint(rect.stroke.as_deref()) {
        Some(_) => rect.stroke_width / 2.0,
        None => 0.0,
    };
    let _ = write!(
        out,
        r#"<rect x="{inset}" y="{inset}" width="{}" height="{}" fill="{}""#,
        rect.width,
        rect.height,
        escape(paint(rect.fill.as_deref()).unwrap_or("none"))
    );
    if let Some(stroke) = paint(rect.stroke.as_deref()) {
        let _ = write!(
            out,
            r#" stroke="{}" stroke-width="{}""#,
            escape(stroke),
            rect.stroke_width
        );
    }
    out.push_str("/></g>");
}

fn write_group(out: &mut String, group: &GroupNode, assets: &AssetCache) {
    let mut transform = format!("translate({} {})", group.left, group.top);
    if group.angle != 0.0 {
        let _ = write!(transform, " rotate({})", group.angle);
    }
    if group.scale_x != 1.0 || group.scale_y != 1.0 {
        let _ = write!(transform, " scale({} {})", group.scale_x, group.scale_y);
    }
    let _ = write!(
        transform,
        " translate({} {})",
        group.width / 2.0,
        group.height / 2.0
    );

    let _ = write!(out, r#"<g transform="{transform}""#);
    if group.opacity < 1.0 {
        let _ = write!(out, r#" opacity="{}""#, group.opacity.max(0.0));
    }
    out.push('>');
    for child in &group.objects {
        write_node(out, child, assets);
    }
    out.push_str("</g>");
}

/// A usable paint value, or `None` for absent/empty/transparent.
fn paint(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("transparent"))
}

/// Escape markup characters. Characters XML 1.0 does not allow (C0 controls
/// other than tab, newline and carriage return, U+FFFE, U+FFFF) become U+FFFD.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}' => {
                out.push(char::REPLACEMENT_CHARACTER)
            }
            c => out.push(c),
        }
    }
    out
}
