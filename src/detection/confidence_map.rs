use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::models::{DetectedElement, ElementCategory};

/// Base overlay color for a category.
pub fn category_color(category: ElementCategory) -> [u8; 3] {
    match category {
        ElementCategory::Structural => [220, 53, 69],
        ElementCategory::Opening => [13, 110, 253],
        ElementCategory::Mechanical => [25, 135, 84],
        _ => [108, 117, 125],
    }
}

/// Paint each element's box in its category color with alpha = confidence.
///
/// Elements are painted in list order, so later ones overwrite earlier ones
/// where boxes overlap.
pub fn render_confidence_map(width: u32, height: u32, elements: &[DetectedElement]) -> RgbaImage {
    let mut map = RgbaImage::new(width, height);

    for element in elements {
        let bbox = element.bbox.clipped_to(width, height);
        if bbox.is_empty() {
            continue;
        }
        let [r, g, b] = category_color(element.category);
        let alpha = (element.confidence.clamp(0.0, 1.0) * 255.0).round() as u8;
        let rect = Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height);
        draw_filled_rect_mut(&mut map, rect, Rgba([r, g, b, alpha]));
    }

    map
}
