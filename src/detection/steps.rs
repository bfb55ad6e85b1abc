use crate::detection::{mask, morphology, preprocessing};
use crate::error::{DetectionError, Result};
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep, StageRaster};

/// Grayscale conversion and contrast stretch
pub struct PreprocessStep {
    pub contrast_gain: f32,
}

impl PipelineStep for PreprocessStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let gray = preprocessing::preprocess(&data.original, self.contrast_gain)?;
        Ok(data.with_raster(StageRaster::Intensity(gray)))
    }

    fn name(&self) -> &str {
        "Preprocess"
    }
}

/// Dark pixels become foreground
pub struct ThresholdStep {
    pub threshold: u8,
}

impl PipelineStep for ThresholdStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let StageRaster::Intensity(gray) = &data.raster else {
            return Err(DetectionError::InvalidImage(
                "thresholding needs a preprocessed intensity raster".to_string(),
            ));
        };
        let mask = mask::build_mask(gray, self.threshold);
        let foreground = mask.count_foreground();
        let total = (mask.width() as usize * mask.height() as usize).max(1);
        Ok(data
            .with_raster(StageRaster::Mask(mask))
            .with_metadata("foreground_pixels", MetadataValue::Int(foreground as i64))
            .with_metadata("foreground_ratio", MetadataValue::Float(foreground as f32 / total as f32)))
    }

    fn name(&self) -> &str {
        "Threshold"
    }
}

fn require_mask<'a>(data: &'a PipelineData, step: &str) -> Result<&'a mask::BinaryMask> {
    data.mask().ok_or_else(|| {
        DetectionError::InvalidImage(format!("{} needs a binary mask", step))
    })
}

/// Repeated closing to bridge small print gaps in lines
pub struct ClosingStep {
    pub kernel_size: u32,
    pub iterations: u32,
}

impl PipelineStep for ClosingStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let mut closed = require_mask(&data, self.name())?.clone();
        for _ in 0..self.iterations {
            closed = morphology::close(&closed, self.kernel_size);
        }
        Ok(data.with_raster(StageRaster::Mask(closed)))
    }

    fn name(&self) -> &str {
        "Closing"
    }
}

/// Single opening to strip isolated specks
pub struct OpeningStep {
    pub kernel_size: u32,
}

impl PipelineStep for OpeningStep {
    fn process(&self, data: PipelineData, _context: &PipelineContext) -> Result<PipelineData> {
        let opened = morphology::open(require_mask(&data, self.name())?, self.kernel_size);
        let foreground = opened.count_foreground() as i64;
        Ok(data
            .with_raster(StageRaster::Mask(opened))
            .with_metadata("cleaned_foreground_pixels", MetadataValue::Int(foreground)))
    }

    fn name(&self) -> &str {
        "Opening"
    }
}
