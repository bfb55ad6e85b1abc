//! Reference scenarios for the detection engine.
//!
//! Tests cover:
//! - A: a thin horizontal line becomes a single wall component
//! - B: the same line is discarded by the minimum size filter
//! - C: a semantic element confirmed by geometry is boosted
//! - D: a classifier timeout degrades to geometric-only results
//! - E: a semantic element outranks a penalized orphan

mod common;

use std::sync::atomic::Ordering;

use planscan::detection::{classify, components, detect_in_mask, integrate};

use common::*;

#[test]
fn test_scenario_a_line_is_wall() {
    let mask = line_mask();
    let labeling = components::label_components(&mask);

    assert_eq!(labeling.len(), 1);
    let component = &labeling[0];
    assert_eq!(component.bbox, BoundingBox::new(1, 5, 8, 1));
    assert_eq!(component.area(), 8);
    assert!(approx_eq(component.aspect_ratio(), 8.0));

    let config = AnalysisConfig {
        min_element_size: 1,
        ..Default::default()
    };
    let found = detect_in_mask(&mask, &config);
    assert_eq!(found.elements.len(), 1);
    let wall = &found.elements[0];
    assert_eq!(wall.element_type, "wall");
    assert_eq!(wall.category, ElementCategory::Structural);
    assert!(approx_eq(wall.confidence, 0.8));
    assert!(wall.has_morphological_support);
    assert!(!wall.has_semantic_support);
    assert_eq!(wall.support_area(), 8);
}

#[test]
fn test_scenario_b_small_line_filtered() {
    let found = detect_in_mask(&line_mask(), &AnalysisConfig::default());

    assert!(found.elements.is_empty());
    assert_eq!(found.total_found, 1);
    assert_eq!(found.filtered_out, 1);
}

#[tokio::test]
async fn test_scenario_c_semantic_boosted_by_overlap() -> anyhow::Result<()> {
    // 1. An 8x8 ink square (area 64) inside the semantic box
    let image = square_image(40, 40, BoundingBox::new(4, 4, 8, 8));
    let classifier = StaticClassifier::from_response(&response(vec![candidate(
        "column",
        ElementCategory::Structural,
        [0.0, 0.0, 20.0, 20.0],
        0.5,
    )]));

    // 2. Analyze
    let detector = ElementDetector::new(AnalysisConfig::default(), classifier)?;
    let result = detector.analyze(&image).await?;

    // 3. One merged element carrying the component
    assert_eq!(result.elements.len(), 1);
    let merged = &result.elements[0];
    assert!(approx_eq(merged.confidence, 0.6), "got {}", merged.confidence);
    assert!(merged.has_morphological_support);
    assert!(merged.has_semantic_support);
    assert_eq!(merged.bbox, BoundingBox::new(0, 0, 20, 20));
    assert_eq!(merged.support_area(), 64);
    assert_eq!(result.processing_metadata.merged_count, 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_timeout_falls_back_to_geometry() -> anyhow::Result<()> {
    // 1. A classifier that never answers, with a short timeout
    let config = AnalysisConfig {
        classifier_timeout_ms: 50,
        ..Default::default()
    };
    let detector = ElementDetector::new(config.clone(), SlowClassifier::new())?;
    let geometric_only = ElementDetector::geometric_only(config)?.detect_geometric(&plan_image())?;

    // 2. Analysis still succeeds
    let result = detector.analyze(&plan_image()).await?;

    // 3. Exactly the geometric elements, unpenalized
    assert_eq!(result.elements.len(), geometric_only.elements.len());
    for (got, expected) in result.elements.iter().zip(&geometric_only.elements) {
        assert_eq!(got.element_type, expected.element_type);
        assert_eq!(got.bbox, expected.bbox);
        assert!(approx_eq(got.confidence, expected.confidence));
        assert!(!got.has_semantic_support);
    }

    let meta = &result.processing_metadata;
    assert!(meta.degraded);
    assert!(meta.quality_tier <= QualityTier::Medium);
    assert_eq!(meta.semantic_count, 0);
    assert_eq!(meta.warnings.len(), 1);
    assert!(meta.warnings[0].contains("timed out"), "got {}", meta.warnings[0]);

    // 4. One retry, then give up
    assert_eq!(detector_calls(&detector), 2);

    Ok(())
}

fn detector_calls(detector: &ElementDetector<SlowClassifier>) -> u32 {
    detector.classifier().calls.load(Ordering::SeqCst)
}

#[test]
fn test_scenario_e_semantic_before_orphan() {
    let semantic = element(BoundingBox::new(0, 0, 5, 5), 0.9, true);
    let orphan = element(BoundingBox::new(50, 50, 5, 5), 0.75, false);
    let semantic_id = semantic.id;

    let merged = integrate::integrate(vec![semantic], vec![orphan], &MergePolicy::default());

    assert_eq!(merged.elements.len(), 2);
    assert_eq!(merged.elements[0].id, semantic_id);
    assert!(approx_eq(merged.elements[1].confidence, 0.55));
    assert_eq!(merged.orphans_kept, 1);
    assert_eq!(merged.merged_count, 0);
}

#[test]
fn test_geometric_classifier_keeps_component_reference() {
    let mask = line_mask();
    let component = std::sync::Arc::new(components::label_components(&mask).remove(0));
    let element = classify::classify_component(component.clone(), &Default::default());

    assert!(std::sync::Arc::ptr_eq(&element.support[0], &component));
}
