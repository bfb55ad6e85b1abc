use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::config::GeometricRules;
use crate::models::{ConnectedComponent, DetectedElement, ElementCategory};

/// Provisional type and confidence from bounding-box geometry alone.
///
/// Rules are checked in order; the first match wins.
pub fn classify_geometry(aspect_ratio: f32, area: u32, rules: &GeometricRules) -> (&'static str, f32) {
    if aspect_ratio > rules.wall_min_aspect {
        ("wall", rules.wall_confidence)
    } else if aspect_ratio < rules.column_max_aspect {
        ("column", rules.column_confidence)
    } else if aspect_ratio >= rules.square_min_aspect
        && aspect_ratio <= rules.square_max_aspect
        && area < rules.square_max_area
    {
        ("column", rules.square_confidence)
    } else if area > rules.slab_min_area {
        ("slab", rules.slab_confidence)
    } else {
        ("unknown", rules.default_confidence)
    }
}

/// Turn a labeled component into a morphological-only element.
pub fn classify_component(component: Arc<ConnectedComponent>, rules: &GeometricRules) -> DetectedElement {
    let aspect_ratio = component.aspect_ratio();
    let area = component.area();
    let (element_type, confidence) = classify_geometry(aspect_ratio, area, rules);

    let mut properties = BTreeMap::new();
    properties.insert("aspectRatio".to_string(), json!(aspect_ratio));
    properties.insert("area".to_string(), json!(area));
    properties.insert("source".to_string(), json!("morphological"));

    DetectedElement {
        id: Uuid::new_v4(),
        element_type: element_type.to_string(),
        // geometry alone cannot tell openings or services apart
        category: ElementCategory::Structural,
        bbox: component.bbox,
        confidence,
        properties,
        has_semantic_support: false,
        has_morphological_support: true,
        support: vec![component],
    }
}

pub fn classify_components(
    components: &[Arc<ConnectedComponent>],
    rules: &GeometricRules,
) -> Vec<DetectedElement> {
    components
        .iter()
        .map(|c| classify_component(Arc::clone(c), rules))
        .collect()
}
