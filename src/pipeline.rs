use image::{DynamicImage, GrayImage};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::detection::mask::BinaryMask;
use crate::error::{DetectionError, Result};

/// Raster carried between stages
#[derive(Debug, Clone)]
pub enum StageRaster {
    /// Nothing derived yet; stages read `original`
    Source,
    /// Single-channel intensity after preprocessing
    Intensity(GrayImage),
    /// Foreground/background bitmap
    Mask(BinaryMask),
}

impl StageRaster {
    /// Image to write for debug output
    fn to_debug_image(&self, original: &DynamicImage) -> DynamicImage {
        match self {
            StageRaster::Source => original.clone(),
            StageRaster::Intensity(gray) => DynamicImage::ImageLuma8(gray.clone()),
            StageRaster::Mask(mask) => DynamicImage::ImageLuma8(mask.to_gray_image()),
        }
    }
}

/// Data that flows through the raster stages of one analysis run
#[derive(Debug, Clone)]
pub struct PipelineData {
    /// Output of the most recent stage
    pub raster: StageRaster,

    /// The (already resized) input image, shared between stages
    pub original: Arc<DynamicImage>,

    /// Per-stage facts (e.g. foreground pixel counts)
    pub metadata: HashMap<String, MetadataValue>,

    /// Wall-clock time per stage, in execution order
    pub timings_ms: IndexMap<String, u64>,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Float(f32),
    Int(i64),
}

impl PipelineData {
    pub fn from_image(original: Arc<DynamicImage>) -> Self {
        Self {
            raster: StageRaster::Source,
            original,
            metadata: HashMap::new(),
            timings_ms: IndexMap::new(),
        }
    }

    pub fn with_raster(mut self, raster: StageRaster) -> Self {
        self.raster = raster;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// The current mask, if a thresholding stage has run
    pub fn mask(&self) -> Option<&BinaryMask> {
        match &self.raster {
            StageRaster::Mask(mask) => Some(mask),
            _ => None,
        }
    }

    /// Take the mask out of the stage output
    pub fn into_mask(self) -> Result<BinaryMask> {
        match self.raster {
            StageRaster::Mask(mask) => Ok(mask),
            _ => Err(DetectionError::InvalidImage(
                "pipeline finished without producing a binary mask".to_string(),
            )),
        }
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// A single raster stage
pub trait PipelineStep: Send + Sync {
    /// Consume one stage's output and produce the next
    fn process(&self, data: PipelineData, context: &PipelineContext) -> Result<PipelineData>;

    /// Human-readable name (used for logs and debug folders)
    fn name(&self) -> &str;
}

/// Ordered list of raster stages
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(DetectionError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order on the input image
    pub fn run(&self, input: Arc<DynamicImage>) -> Result<PipelineData> {
        self.run_partial(input, self.steps.len())
    }

    /// Run only the first `num_steps` stages (useful for debugging)
    pub fn run_partial(&self, input: Arc<DynamicImage>, num_steps: usize) -> Result<PipelineData> {
        let mut data = PipelineData::from_image(input);
        self.save_debug(0, "input", &data)?;

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            debug!("Running step {}: {}", step_idx + 1, step.name());
            let start = Instant::now();
            data = step.process(data, &self.context)?;
            let elapsed = start.elapsed().as_millis() as u64;
            data.timings_ms.insert(step_key(step.name()), elapsed);

            self.save_debug(step_idx + 1, step.name(), &data)?;
        }

        Ok(data)
    }

    fn save_debug(&self, index: usize, step_name: &str, data: &PipelineData) -> Result<()> {
        let Some(debug_config) = &self.context.debug else {
            return Ok(());
        };

        let step_dir_name = format!("{:02}_{}", index, step_key(step_name));
        let step_dir = debug_config.output_dir.join(&step_dir_name);
        std::fs::create_dir_all(&step_dir)?;
        save_png(&step_dir.join("01.png"), &data.raster.to_debug_image(&data.original))?;
        debug!("Debug: saved {}/01.png", step_dir_name);
        Ok(())
    }
}

fn step_key(step_name: &str) -> String {
    step_name.to_lowercase().replace(' ', "_")
}

fn save_png(path: &Path, image: &DynamicImage) -> Result<()> {
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
