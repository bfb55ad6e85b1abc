use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Axis-aligned pixel rectangle. Serialized as `[x, y, width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Tight box around inclusive pixel extremes.
    pub fn from_extremes(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f32 / self.height as f32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rectangle overlap where `x2 = x + width`; touching edges count.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        let (ax1, ay1) = (self.x as u64, self.y as u64);
        let (ax2, ay2) = (ax1 + self.width as u64, ay1 + self.height as u64);
        let (bx1, by1) = (other.x as u64, other.y as u64);
        let (bx2, by2) = (bx1 + other.width as u64, by1 + other.height as u64);
        !(ax2 < bx1 || bx2 < ax1 || ay2 < by1 || by2 < ay1)
    }

    /// Whether the box lies inside a `width` x `height` raster.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// Intersection with a `width` x `height` raster; may be empty.
    pub fn clipped_to(&self, width: u32, height: u32) -> BoundingBox {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let max_x = (self.x as u64 + self.width as u64).min(width as u64) as u32;
        let max_y = (self.y as u64 + self.height as u64).min(height as u64) as u32;
        BoundingBox {
            x,
            y,
            width: max_x.saturating_sub(x),
            height: max_y.saturating_sub(y),
        }
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from([x, y, width, height]: [u32; 4]) -> Self {
        Self { x, y, width, height }
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// Maximal 8-connected set of foreground pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedComponent {
    /// Pixels in the order the flood fill reached them.
    pub pixels: Vec<(u32, u32)>,
    pub bbox: BoundingBox,
}

impl ConnectedComponent {
    pub fn area(&self) -> u32 {
        self.pixels.len() as u32
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.bbox.aspect_ratio()
    }
}

/// Coarse element family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementCategory {
    Structural,
    Opening,
    Mechanical,
    Architectural,
    Annotation,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementCategory::Structural => "structural",
            ElementCategory::Opening => "opening",
            ElementCategory::Mechanical => "mechanical",
            ElementCategory::Architectural => "architectural",
            ElementCategory::Annotation => "annotation",
            ElementCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedElement {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub element_type: String,
    pub category: ElementCategory,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub has_semantic_support: bool,
    pub has_morphological_support: bool,
    /// Components backing this element, shared with the labeler output.
    /// Held as strong references so the pixel sets outlive the labeling pass
    /// without being copied.
    #[serde(skip)]
    pub support: Vec<Arc<ConnectedComponent>>,
}

impl DetectedElement {
    /// Ranking score: confidence plus a bonus per supporting source.
    pub fn relevance(&self, bonus: f32) -> f32 {
        let mut score = self.confidence;
        if self.has_morphological_support {
            score += bonus;
        }
        if self.has_semantic_support {
            score += bonus;
        }
        score
    }

    /// Foreground pixels of all supporting components.
    pub fn support_pixels(&self) -> impl Iterator<Item = &(u32, u32)> {
        self.support.iter().flat_map(|c| c.pixels.iter())
    }

    pub fn support_area(&self) -> u32 {
        self.support.iter().map(|c| c.area()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// Tier for an average confidence on the 0-100 scale.
    pub fn from_average(average: f32) -> Self {
        if average > 70.0 {
            QualityTier::High
        } else if average > 50.0 {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Low => f.write_str("low"),
            QualityTier::Medium => f.write_str("medium"),
            QualityTier::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    /// Semantic candidates accepted into the merge.
    pub semantic_count: usize,
    /// Geometric elements that survived size filtering.
    pub morphological_count: usize,
    /// Semantic elements confirmed by at least one component.
    pub merged_count: usize,
    pub quality_tier: QualityTier,
    /// True when the classifier failed and only geometry was used.
    pub degraded: bool,
    pub components_found: usize,
    pub components_filtered: usize,
    pub orphans_kept: usize,
    pub orphans_dropped: usize,
    pub semantic_rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_confidence: Option<f32>,
    pub warnings: Vec<String>,
    pub category_counts: BTreeMap<ElementCategory, usize>,
    pub stage_timings_ms: IndexMap<String, u64>,
    pub image_width: u32,
    pub image_height: u32,
    pub analyzed_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub elements: Vec<DetectedElement>,
    /// Mean element confidence on a 0-100 scale.
    pub average_confidence: f32,
    #[serde(skip)]
    pub confidence_map: RgbaImage,
    pub processing_metadata: ProcessingMetadata,
}

impl AnalysisResult {
    /// Elements at or above a consumer-chosen confidence.
    pub fn confident_elements(&self, threshold: f32) -> impl Iterator<Item = &DetectedElement> {
        self.elements.iter().filter(move |e| e.confidence >= threshold)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
