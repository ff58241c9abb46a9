//! Barcode placeholder geometry.
//!
//! The editor marks the barcode position with a two-child group: a frame
//! rectangle and a "Barcode" label. The real barcode image is composited at
//! the frame's position, sized from the frame plus its stroke.

use crate::models::{GroupNode, SceneNode};

/// Stroke widths added to the frame size when sizing the barcode.
pub const STROKE_FACTOR: f64 = 4.0;

/// Where the barcode image goes, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarcodeTransform {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl BarcodeTransform {
    pub fn is_horizontal(&self) -> bool {
        self.angle == 0.0
    }

    /// Uniform scale for an image of natural size `image_width` x
    /// `image_height` placed with this transform.
    ///
    /// A horizontal barcode is scaled so its width matches the frame width.
    /// A rotated one is scaled so the height of its rotated bounding box
    /// matches the frame width, so the bars span the frame's long side either
    /// way.
    pub fn image_scale(&self, image_width: u32, image_height: u32) -> f64 {
        let (w, h) = (f64::from(image_width), f64::from(image_height));
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let extent = if self.is_horizontal() {
            (w * cos).abs() + (h * sin).abs()
        } else {
            (w * sin).abs() + (h * cos).abs()
        };
        if extent > 0.0 {
            self.width / extent
        } else {
            1.0
        }
    }
}

/// Compute the barcode transform for a placeholder group, or `None` if the
/// group is not a barcode placeholder or its frame is not a rectangle.
pub fn place_barcode(group: &GroupNode) -> Option<BarcodeTransform> {
    if !group.is_barcode_placeholder() {
        return None;
    }
    let SceneNode::Rect(frame) = &group.objects[0] else {
        return None;
    };

    Some(BarcodeTransform {
        left: frame.left * group.scale_x + group.left + (group.width / 2.0) * group.scale_x,
        top: frame.top * group.scale_y + group.top + (group.height / 2.0) * group.scale_y,
        width: frame.width + STROKE_FACTOR * frame.stroke_width,
        height: frame.height + STROKE_FACTOR * frame.stroke_width,
        angle: group.angle + frame.angle,
    })
}

/// The first top-level barcode placeholder, with its object index.
pub fn find_barcode(objects: &[SceneNode]) -> Option<(usize, BarcodeTransform)> {
    objects.iter().enumerate().find_map(|(index, node)| match node {
        SceneNode::Group(group) => place_barcode(group).map(|t| (index, t)),
        _ => None,
    })
}
