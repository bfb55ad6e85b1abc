//! Boundary to the external semantic classifier.
//!
//! The classifier itself lives outside this crate; here we define the request
//! and response shapes, the trait implementations plug into, and the adapter
//! that bounds every call with a timeout and a small retry budget.

pub mod sources;

use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::ClassifierError;
use crate::models::{BoundingBox, ElementCategory};

pub use sources::{NullClassifier, StaticClassifier};

/// What the classifier is asked to label.
#[derive(Debug, Clone)]
pub struct ClassifierRequest {
    /// PNG-encoded raster, in the same pixel space as the geometric stage.
    pub image_png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub prompt: String,
}

impl ClassifierRequest {
    pub fn encode(image: &DynamicImage, prompt: &str) -> Result<Self, ClassifierError> {
        let mut image_png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut image_png), ImageFormat::Png)
            .map_err(|e| ClassifierError::Transport(format!("failed to encode request image: {}", e)))?;
        let (width, height) = image.dimensions();
        Ok(Self {
            image_png,
            width,
            height,
            prompt: prompt.to_string(),
        })
    }
}

/// One element proposed by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticCandidate {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default = "unknown_category")]
    pub category: ElementCategory,
    /// `[x, y, width, height]` in request pixels; may be fractional.
    pub bbox: [f32; 4],
    pub confidence: f32,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

fn unknown_category() -> ElementCategory {
    ElementCategory::Unknown
}

impl SemanticCandidate {
    /// Pixel box covering the candidate, clipped to the raster.
    /// `None` when nothing of it lies inside.
    pub fn pixel_bbox(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let [x, y, w, h] = self.bbox;
        let x0 = x.max(0.0).floor().min(width as f32) as u32;
        let y0 = y.max(0.0).floor().min(height as f32) as u32;
        let x1 = (x + w).ceil().clamp(0.0, width as f32) as u32;
        let y1 = (y + h).ceil().clamp(0.0, height as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(BoundingBox::new(x0, y0, x1 - x0, y1 - y0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierResponse {
    pub elements: Vec<SemanticCandidate>,
    #[serde(default)]
    pub analysis_confidence: f32,
}

impl ClassifierResponse {
    /// Reject the whole response if any part of it is out of contract.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(0.0..=1.0).contains(&self.analysis_confidence) {
            return Err(ClassifierError::MalformedResponse(format!(
                "analysis confidence {} outside [0, 1]",
                self.analysis_confidence
            )));
        }
        for (i, candidate) in self.elements.iter().enumerate() {
            if candidate.element_type.trim().is_empty() {
                return Err(ClassifierError::MalformedResponse(format!(
                    "element {} has an empty type",
                    i
                )));
            }
            if !(0.0..=1.0).contains(&candidate.confidence) {
                return Err(ClassifierError::MalformedResponse(format!(
                    "element {} confidence {} outside [0, 1]",
                    i, candidate.confidence
                )));
            }
            let [x, y, w, h] = candidate.bbox;
            if ![x, y, w, h].iter().all(|v| v.is_finite()) || w <= 0.0 || h <= 0.0 {
                return Err(ClassifierError::MalformedResponse(format!(
                    "element {} has invalid bbox {:?}",
                    i, candidate.bbox
                )));
            }
        }
        Ok(())
    }
}

/// Parse and validate a raw JSON payload.
pub fn parse_response(payload: &str) -> Result<ClassifierResponse, ClassifierError> {
    let response: ClassifierResponse = serde_json::from_str(payload)
        .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
    response.validate()?;
    Ok(response)
}

/// An external capability that labels image regions by meaning.
pub trait SemanticClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<ClassifierResponse, ClassifierError>;
}

/// Wraps a classifier with a per-attempt timeout, bounded retries and
/// response validation.
#[derive(Debug, Clone)]
pub struct ClassifierAdapter<C> {
    classifier: C,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

impl<C: SemanticClassifier> ClassifierAdapter<C> {
    pub fn new(classifier: C, config: &AnalysisConfig) -> Self {
        Self {
            classifier,
            timeout: Duration::from_millis(config.classifier_timeout_ms),
            max_retries: config.classifier_max_retries,
            backoff: Duration::from_millis(config.classifier_backoff_ms),
        }
    }

    pub fn inner(&self) -> &C {
        &self.classifier
    }

    pub async fn classify(
        &self,
        image: &DynamicImage,
        prompt: &str,
    ) -> Result<ClassifierResponse, ClassifierError> {
        let request = ClassifierRequest::encode(image, prompt)?;
        let max_attempts = self.max_retries + 1;
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            debug!("Classifier attempt {} of {}", attempt, max_attempts);
            let outcome = match tokio::time::timeout(self.timeout, self.classifier.classify(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ClassifierError::Timeout(self.timeout.as_millis() as u64)),
            };

            let error = match outcome.and_then(|response| response.validate().map(|_| response)) {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if !error.is_retryable() {
                return Err(error);
            }
            if attempt >= max_attempts {
                if attempt == 1 {
                    return Err(error);
                }
                return Err(ClassifierError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            warn!("Classifier attempt {} failed ({}), retrying in {:?}", attempt, error, delay);
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }
}
