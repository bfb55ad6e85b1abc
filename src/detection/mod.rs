pub mod assemble;
pub mod classify;
pub mod components;
pub mod confidence_map;
pub mod integrate;
pub mod mask;
pub mod morphology;
pub mod preprocessing;
pub mod steps;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::cache::{AnalysisCache, CacheKey};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::{AnalysisResult, ConnectedComponent, DetectedElement};
use crate::pipeline::Pipeline;
use crate::semantic::{ClassifierAdapter, NullClassifier, SemanticClassifier};

use self::assemble::RunStats;
use self::components::Labeling;
use self::mask::BinaryMask;

/// Output of the purely geometric half of a run.
#[derive(Debug, Clone)]
pub struct GeometricDetection {
    /// Input after fitting to the configured bounds; all boxes refer to it.
    pub image: Arc<DynamicImage>,
    pub components: Vec<Arc<ConnectedComponent>>,
    pub elements: Vec<DetectedElement>,
    pub components_found: usize,
    pub components_filtered: usize,
    pub timings_ms: IndexMap<String, u64>,
}

/// Hybrid element detector: morphology plus an external semantic classifier.
pub struct ElementDetector<C> {
    config: AnalysisConfig,
    pipeline: Pipeline,
    adapter: ClassifierAdapter<C>,
}

impl ElementDetector<NullClassifier> {
    /// Detector that never consults a classifier.
    pub fn geometric_only(config: AnalysisConfig) -> Result<Self> {
        Self::new(config, NullClassifier)
    }
}

impl<C: SemanticClassifier> ElementDetector<C> {
    /// Validates `config` before anything else happens.
    pub fn new(config: AnalysisConfig, classifier: C) -> Result<Self> {
        config.validate()?;
        let pipeline = build_standard_pipeline(&config);
        let adapter = ClassifierAdapter::new(classifier, &config);
        Ok(Self {
            config,
            pipeline,
            adapter,
        })
    }

    /// Write every raster stage as PNG under `output_dir` (must be empty).
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        self.pipeline = self.pipeline.with_debug(output_dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        self.adapter.inner()
    }

    /// Morphological stages, labeling and geometric classification.
    pub fn detect_geometric(&self, image: &DynamicImage) -> Result<GeometricDetection> {
        preprocessing::ensure_non_empty(image)?;
        let fitted = Arc::new(preprocessing::fit_within(
            image,
            self.config.max_width,
            self.config.max_height,
        ));
        debug!("Analyzing {}x{} raster", fitted.width(), fitted.height());

        let data = self.pipeline.run(Arc::clone(&fitted))?;
        debug!(
            "Foreground: {} pixels after threshold ({:.1}%), {} after cleaning",
            data.get_int("foreground_pixels").unwrap_or(0),
            data.get_float("foreground_ratio").unwrap_or(0.0) * 100.0,
            data.get_int("cleaned_foreground_pixels").unwrap_or(0)
        );
        let mut timings_ms = data.timings_ms.clone();
        let mask = data.into_mask()?;

        let start = Instant::now();
        let found = detect_in_mask(&mask, &self.config);
        timings_ms.insert("labeling".to_string(), start.elapsed().as_millis() as u64);

        debug!(
            "Found {} components, {} filtered by size, {} geometric elements",
            found.total_found,
            found.filtered_out,
            found.elements.len()
        );

        Ok(GeometricDetection {
            image: fitted,
            components: found.components,
            elements: found.elements,
            components_found: found.total_found,
            components_filtered: found.filtered_out,
            timings_ms,
        })
    }

    /// Run the whole engine on one image.
    ///
    /// Classifier failures do not fail the run: the result then holds the
    /// geometric elements only and carries the error as a warning.
    pub async fn analyze(&self, image: &DynamicImage) -> Result<AnalysisResult> {
        let geometric = self.detect_geometric(image)?;
        let (width, height) = (geometric.image.width(), geometric.image.height());

        let mut stats = RunStats {
            image_width: width,
            image_height: height,
            components_found: geometric.components_found,
            components_filtered: geometric.components_filtered,
            morphological_count: geometric.elements.len(),
            stage_timings_ms: geometric.timings_ms,
            ..Default::default()
        };

        let start = Instant::now();
        let classified = self.adapter.classify(&geometric.image, self.config.prompt()).await;
        stats
            .stage_timings_ms
            .insert("semantic_classification".to_string(), start.elapsed().as_millis() as u64);

        let start = Instant::now();
        let elements = match classified {
            Ok(response) => {
                let (semantic, rejected) = integrate::semantic_elements(&response, width, height);
                stats.semantic_count = semantic.len();
                stats.semantic_rejected = rejected;
                stats.classifier_confidence = Some(response.analysis_confidence);

                let merged = integrate::integrate(semantic, geometric.elements, &self.config.merge);
                stats.merged_count = merged.merged_count;
                stats.orphans_kept = merged.orphans_kept;
                stats.orphans_dropped = merged.orphans_dropped;
                merged.elements
            }
            Err(error) => {
                warn!("Semantic classification failed, using geometric results only: {}", error);
                stats.degraded = true;
                stats.warnings.push(error.to_string());
                let mut elements = geometric.elements;
                integrate::sort_by_relevance(&mut elements, self.config.merge.relevance_bonus);
                elements
            }
        };
        stats
            .stage_timings_ms
            .insert("integration".to_string(), start.elapsed().as_millis() as u64);

        let result = assemble::assemble(elements, stats);
        info!(
            "Analysis complete: {} elements, average confidence {:.1}, quality {}",
            result.elements.len(),
            result.average_confidence,
            result.processing_metadata.quality_tier
        );
        Ok(result)
    }

    /// Like [`analyze`](Self::analyze), reusing results held in `cache`.
    /// Degraded results are returned but not stored.
    pub async fn analyze_cached(
        &self,
        image: &DynamicImage,
        cache: &mut AnalysisCache,
    ) -> Result<Arc<AnalysisResult>> {
        let key = CacheKey::new(image, &self.config);
        if let Some(result) = cache.get(&key) {
            debug!("Analysis cache hit");
            return Ok(result);
        }

        let result = Arc::new(self.analyze(image).await?);
        if !result.processing_metadata.degraded {
            cache.insert(key, Arc::clone(&result));
        }
        Ok(result)
    }
}

/// Elements found in one cleaned mask.
#[derive(Debug, Clone)]
pub struct MaskDetection {
    pub components: Vec<Arc<ConnectedComponent>>,
    pub elements: Vec<DetectedElement>,
    pub total_found: usize,
    pub filtered_out: usize,
}

/// Label a cleaned mask, filter by size and classify what is left.
pub fn detect_in_mask(mask: &BinaryMask, config: &AnalysisConfig) -> MaskDetection {
    let Labeling {
        components,
        total_found,
        filtered_out,
    } = components::find_components(mask, config.min_element_size, config.max_element_size);
    let components: Vec<Arc<ConnectedComponent>> = components.into_iter().map(Arc::new).collect();
    let elements = classify::classify_components(&components, &config.geometry);

    MaskDetection {
        components,
        elements,
        total_found,
        filtered_out,
    }
}

/// The standard raster stages: preprocess, threshold, close, open.
pub fn build_standard_pipeline(config: &AnalysisConfig) -> Pipeline {
    use self::steps::*;

    Pipeline::new()
        .add_step(Arc::new(PreprocessStep {
            contrast_gain: config.contrast_gain,
        }))
        .add_step(Arc::new(ThresholdStep {
            threshold: config.threshold,
        }))
        .add_step(Arc::new(ClosingStep {
            kernel_size: config.kernel_size,
            iterations: config.closing_iterations,
        }))
        .add_step(Arc::new(OpeningStep {
            kernel_size: config.kernel_size,
        }))
}
