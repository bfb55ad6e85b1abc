use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Prompt sent to the semantic classifier when none is configured.
pub const DEFAULT_PROMPT: &str = "Identify building elements in this technical drawing. \
For each element return its type (wall, column, slab, door, window, duct, stair, label, ...), \
its category (structural, opening, mechanical, architectural, annotation or unknown), \
a pixel bounding box [x, y, width, height], a confidence between 0 and 1 \
and any properties you can read (material, thickness, dimensions).";

/// Every tunable of a detection run.
///
/// Built once (from defaults or a TOML file) and validated before any image
/// is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AnalysisConfig {
    /// Intensities strictly below this value are foreground.
    pub threshold: u8,
    /// Contrast gain applied around mid-gray.
    pub contrast_gain: f32,
    /// Side of the square structuring element; must be odd.
    pub kernel_size: u32,
    pub closing_iterations: u32,
    pub min_element_size: u32,
    pub max_element_size: u32,
    /// Larger inputs are scaled down to fit, keeping the aspect ratio.
    pub max_width: u32,
    pub max_height: u32,
    pub classifier_timeout_ms: u64,
    pub classifier_max_retries: u32,
    pub classifier_backoff_ms: u64,
    /// Only consumed downstream; never gates detection here.
    pub confidence_threshold: f32,
    pub prompt: Option<String>,
    pub geometry: GeometricRules,
    pub merge: MergePolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: 180,
            contrast_gain: 1.2,
            kernel_size: 3,
            closing_iterations: 2,
            min_element_size: 50,
            max_element_size: 100_000,
            max_width: 4096,
            max_height: 4096,
            classifier_timeout_ms: 10_000,
            classifier_max_retries: 1,
            classifier_backoff_ms: 250,
            confidence_threshold: 0.6,
            prompt: None,
            geometry: GeometricRules::default(),
            merge: MergePolicy::default(),
        }
    }
}

/// Aspect-ratio and area heuristics of the geometric classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct GeometricRules {
    pub wall_min_aspect: f32,
    pub wall_confidence: f32,
    pub column_max_aspect: f32,
    pub column_confidence: f32,
    pub square_min_aspect: f32,
    pub square_max_aspect: f32,
    pub square_max_area: u32,
    pub square_confidence: f32,
    pub slab_min_area: u32,
    pub slab_confidence: f32,
    pub default_confidence: f32,
}

impl Default for GeometricRules {
    fn default() -> Self {
        Self {
            wall_min_aspect: 5.0,
            wall_confidence: 0.8,
            column_max_aspect: 0.2,
            column_confidence: 0.8,
            square_min_aspect: 0.8,
            square_max_aspect: 1.2,
            square_max_area: 1000,
            square_confidence: 0.7,
            slab_min_area: 5000,
            slab_confidence: 0.6,
            default_confidence: 0.7,
        }
    }
}

/// Confidence adjustments applied when merging the two detection sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MergePolicy {
    pub support_boost: f32,
    pub orphan_min_confidence: f32,
    pub orphan_penalty: f32,
    pub orphan_floor: f32,
    pub relevance_bonus: f32,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            support_boost: 0.1,
            orphan_min_confidence: 0.5,
            orphan_penalty: 0.2,
            orphan_floor: 0.3,
            relevance_bonus: 0.1,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(DetectionError::MorphologicalConfig(format!(
                "kernel size must be a positive odd number, got {}",
                self.kernel_size
            )));
        }
        if self.closing_iterations == 0 {
            return Err(DetectionError::MorphologicalConfig(
                "closing iterations must be at least 1".to_string(),
            ));
        }
        if self.min_element_size > self.max_element_size {
            return Err(DetectionError::Config(format!(
                "min_element_size ({}) exceeds max_element_size ({})",
                self.min_element_size, self.max_element_size
            )));
        }
        if !self.contrast_gain.is_finite() || self.contrast_gain <= 0.0 {
            return Err(DetectionError::Config(format!(
                "contrast gain must be a positive number, got {}",
                self.contrast_gain
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(DetectionError::Config(
                "maximum raster bounds must be non-zero".to_string(),
            ));
        }
        if self.classifier_timeout_ms == 0 {
            return Err(DetectionError::Config(
                "classifier timeout must be non-zero".to_string(),
            ));
        }
        check_unit("confidence_threshold", self.confidence_threshold)?;

        let g = &self.geometry;
        for (name, value) in [
            ("geometry.wall_confidence", g.wall_confidence),
            ("geometry.column_confidence", g.column_confidence),
            ("geometry.square_confidence", g.square_confidence),
            ("geometry.slab_confidence", g.slab_confidence),
            ("geometry.default_confidence", g.default_confidence),
        ] {
            check_unit(name, value)?;
        }
        if g.square_min_aspect > g.square_max_aspect {
            return Err(DetectionError::Config(
                "geometry.square_min_aspect exceeds geometry.square_max_aspect".to_string(),
            ));
        }

        let m = &self.merge;
        for (name, value) in [
            ("merge.support_boost", m.support_boost),
            ("merge.orphan_min_confidence", m.orphan_min_confidence),
            ("merge.orphan_penalty", m.orphan_penalty),
            ("merge.orphan_floor", m.orphan_floor),
            ("merge.relevance_bonus", m.relevance_bonus),
        ] {
            check_unit(name, value)?;
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DetectionError::Config(format!(
            "{} must lie in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
