use std::sync::Arc;

use uuid::Uuid;

use crate::config::MergePolicy;
use crate::models::DetectedElement;
use crate::semantic::ClassifierResponse;

/// Outcome of merging the semantic and geometric detections.
#[derive(Debug, Clone)]
pub struct Integration {
    /// Final elements, ordered by relevance.
    pub elements: Vec<DetectedElement>,
    pub merged_count: usize,
    pub orphans_kept: usize,
    pub orphans_dropped: usize,
}

/// Convert classifier candidates into elements on a `width` x `height` raster.
///
/// Returns the elements and the number of candidates rejected because their
/// box fell entirely outside the raster.
pub fn semantic_elements(
    response: &ClassifierResponse,
    width: u32,
    height: u32,
) -> (Vec<DetectedElement>, usize) {
    let mut elements = Vec::with_capacity(response.elements.len());
    let mut rejected = 0;

    for candidate in &response.elements {
        let Some(bbox) = candidate.pixel_bbox(width, height) else {
            rejected += 1;
            continue;
        };
        elements.push(DetectedElement {
            id: Uuid::new_v4(),
            element_type: candidate.element_type.clone(),
            category: candidate.category,
            bbox,
            confidence: candidate.confidence.clamp(0.0, 1.0),
            properties: candidate.properties.clone(),
            has_semantic_support: true,
            has_morphological_support: false,
            support: Vec::new(),
        });
    }

    (elements, rejected)
}

/// Stable descending sort by relevance; equal scores keep insertion order.
pub fn sort_by_relevance(elements: &mut [DetectedElement], bonus: f32) {
    elements.sort_by(|a, b| {
        b.relevance(bonus)
            .partial_cmp(&a.relevance(bonus))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Merge semantic elements with geometric ones by bounding-box overlap.
///
/// Semantic elements confirmed by geometry are boosted and take over the
/// matched components. Geometric elements nothing semantic overlaps are
/// orphans: kept with a penalty when confident enough, dropped otherwise.
pub fn integrate(
    semantic: Vec<DetectedElement>,
    geometric: Vec<DetectedElement>,
    policy: &MergePolicy,
) -> Integration {
    let mut matched = vec![false; geometric.len()];
    let mut merged_count = 0;
    let mut elements = Vec::with_capacity(semantic.len() + geometric.len());

    for mut element in semantic {
        let mut support = Vec::new();
        let mut confirmed = false;
        for (i, g) in geometric.iter().enumerate() {
            if element.bbox.overlaps(&g.bbox) {
                matched[i] = true;
                confirmed = true;
                support.extend(g.support.iter().map(Arc::clone));
            }
        }

        if confirmed {
            element.has_morphological_support = true;
            element.confidence = (element.confidence + policy.support_boost).min(1.0);
            element.support = support;
            merged_count += 1;
        }
        elements.push(element);
    }

    let mut orphans_kept = 0;
    let mut orphans_dropped = 0;
    for (mut element, was_matched) in geometric.into_iter().zip(matched) {
        if was_matched {
            continue;
        }
        if element.confidence > policy.orphan_min_confidence {
            element.confidence = (element.confidence - policy.orphan_penalty).max(policy.orphan_floor);
            elements.push(element);
            orphans_kept += 1;
        } else {
            orphans_dropped += 1;
        }
    }

    sort_by_relevance(&mut elements, policy.relevance_bonus);

    Integration {
        elements,
        merged_count,
        orphans_kept,
        orphans_dropped,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::{BoundingBox, ElementCategory};

    fn element(x: u32, confidence: f32, semantic: bool) -> DetectedElement {
        DetectedElement {
            id: Uuid::new_v4(),
            element_type: "wall".to_string(),
            category: ElementCategory::Structural,
            bbox: BoundingBox::new(x, 0, 5, 5),
            confidence,
            properties: BTreeMap::new(),
            has_semantic_support: semantic,
            has_morphological_support: !semantic,
            support: Vec::new(),
        }
    }

    #[test]
    fn test_equal_relevance_keeps_input_order() {
        let elements = vec![
            element(0, 0.5, true),
            element(10, 0.9, true),
            element(20, 0.5, true),
            element(30, 0.7, true),
            element(40, 0.5, true),
            element(50, 0.9, true),
        ];
        let ids: Vec<Uuid> = elements.iter().map(|e| e.id).collect();

        let mut sorted = elements;
        sort_by_relevance(&mut sorted, 0.1);

        let order: Vec<Uuid> = sorted.iter().map(|e| e.id).collect();
        assert_eq!(order, vec![ids[1], ids[5], ids[3], ids[0], ids[2], ids[4]]);
    }

    #[test]
    fn test_integrate_ties_follow_semantic_then_orphan_order() {
        // No penalty, so orphans tie with the unconfirmed semantic elements
        let policy = MergePolicy {
            orphan_penalty: 0.0,
            ..Default::default()
        };
        let semantic = vec![element(100, 0.75, true), element(120, 0.75, true)];
        let geometric = vec![element(0, 0.75, false), element(20, 0.75, false)];
        let ids: Vec<Uuid> = semantic.iter().chain(&geometric).map(|e| e.id).collect();

        let merged = integrate(semantic, geometric, &policy);

        let order: Vec<Uuid> = merged.elements.iter().map(|e| e.id).collect();
        assert_eq!(order, ids);
        assert_eq!(merged.orphans_kept, 2);
    }
}
