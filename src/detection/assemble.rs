use std::collections::BTreeMap;

use indexmap::IndexMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::models::{AnalysisResult, DetectedElement, ProcessingMetadata, QualityTier};

use super::confidence_map::render_confidence_map;

/// Counters gathered while a run progresses.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub image_width: u32,
    pub image_height: u32,
    pub components_found: usize,
    pub components_filtered: usize,
    pub semantic_count: usize,
    pub semantic_rejected: usize,
    pub morphological_count: usize,
    pub merged_count: usize,
    pub orphans_kept: usize,
    pub orphans_dropped: usize,
    pub classifier_confidence: Option<f32>,
    pub degraded: bool,
    pub warnings: Vec<String>,
    pub stage_timings_ms: IndexMap<String, u64>,
}

/// Mean confidence on the 0-100 scale; zero for an empty list.
pub fn average_confidence(elements: &[DetectedElement]) -> f32 {
    if elements.is_empty() {
        return 0.0;
    }
    let sum: f32 = elements.iter().map(|e| e.confidence).sum();
    sum / elements.len() as f32 * 100.0
}

/// Degraded runs never rate above medium.
pub fn quality_tier(average: f32, degraded: bool) -> QualityTier {
    let tier = QualityTier::from_average(average);
    if degraded { tier.min(QualityTier::Medium) } else { tier }
}

/// Build the final result from ordered elements and run counters.
pub fn assemble(elements: Vec<DetectedElement>, stats: RunStats) -> AnalysisResult {
    let average = average_confidence(&elements);
    let confidence_map = render_confidence_map(stats.image_width, stats.image_height, &elements);

    let mut category_counts = BTreeMap::new();
    for element in &elements {
        *category_counts.entry(element.category).or_insert(0) += 1;
    }

    let analyzed_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    let processing_metadata = ProcessingMetadata {
        semantic_count: stats.semantic_count,
        morphological_count: stats.morphological_count,
        merged_count: stats.merged_count,
        quality_tier: quality_tier(average, stats.degraded),
        degraded: stats.degraded,
        components_found: stats.components_found,
        components_filtered: stats.components_filtered,
        orphans_kept: stats.orphans_kept,
        orphans_dropped: stats.orphans_dropped,
        semantic_rejected: stats.semantic_rejected,
        classifier_confidence: stats.classifier_confidence,
        warnings: stats.warnings,
        category_counts,
        stage_timings_ms: stats.stage_timings_ms,
        image_width: stats.image_width,
        image_height: stats.image_height,
        analyzed_at,
    };

    AnalysisResult {
        elements,
        average_confidence: average,
        confidence_map,
        processing_metadata,
    }
}
