use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};
use planscan::{
    BinaryMask, BoundingBox, ClassifierError, ClassifierRequest, ClassifierResponse,
    DetectedElement, ElementCategory, SemanticCandidate, SemanticClassifier,
};
use uuid::Uuid;

/// Wall rectangle painted by `plan_image`: 180x6 at (10, 20).
pub const PLAN_WALL: BoundingBox = BoundingBox { x: 10, y: 20, width: 180, height: 6 };
/// Column square painted by `plan_image`: 12x12 at (40, 60).
pub const PLAN_COLUMN: BoundingBox = BoundingBox { x: 40, y: 60, width: 12, height: 12 };

/// A 200x120 white drawing with one wall, one column and a single-pixel speck.
pub fn plan_image() -> DynamicImage {
    let mut img = RgbImage::from_pixel(200, 120, Rgb([255, 255, 255]));
    for rect in [PLAN_WALL, PLAN_COLUMN] {
        fill(&mut img, rect, Rgb([0, 0, 0]));
    }
    img.put_pixel(150, 100, Rgb([0, 0, 0]));
    DynamicImage::ImageRgb8(img)
}

/// White image of the given size with one black square.
pub fn square_image(width: u32, height: u32, square: BoundingBox) -> DynamicImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    fill(&mut img, square, Rgb([0, 0, 0]));
    DynamicImage::ImageRgb8(img)
}

pub fn fill(img: &mut RgbImage, rect: BoundingBox, color: Rgb<u8>) {
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            img.put_pixel(x, y, color);
        }
    }
}

/// 10x10 mask with an 8-pixel horizontal line on row 5 starting at x = 1.
pub fn line_mask() -> BinaryMask {
    let mut mask = BinaryMask::new(10, 10);
    for x in 1..9 {
        mask.set(x, 5, true);
    }
    mask
}

pub fn candidate(element_type: &str, category: ElementCategory, bbox: [f32; 4], confidence: f32) -> SemanticCandidate {
    SemanticCandidate {
        element_type: element_type.to_string(),
        category,
        bbox,
        confidence,
        properties: BTreeMap::new(),
    }
}

pub fn response(elements: Vec<SemanticCandidate>) -> ClassifierResponse {
    ClassifierResponse {
        elements,
        analysis_confidence: 0.8,
    }
}

/// Bare element for exercising the integrator directly.
pub fn element(bbox: BoundingBox, confidence: f32, semantic: bool) -> DetectedElement {
    DetectedElement {
        id: Uuid::new_v4(),
        element_type: if semantic { "door".to_string() } else { "wall".to_string() },
        category: if semantic { ElementCategory::Opening } else { ElementCategory::Structural },
        bbox,
        confidence,
        properties: BTreeMap::new(),
        has_semantic_support: semantic,
        has_morphological_support: !semantic,
        support: Vec::new(),
    }
}

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

/// Never answers within any sane timeout.
pub struct SlowClassifier {
    pub calls: AtomicU32,
}

impl SlowClassifier {
    pub fn new() -> Self {
        Self { calls: AtomicU32::new(0) }
    }
}

impl SemanticClassifier for SlowClassifier {
    async fn classify(&self, _request: &ClassifierRequest) -> Result<ClassifierResponse, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(response(Vec::new()))
    }
}

/// Fails the first `failures` calls with `error`, then answers `response`.
pub struct FlakyClassifier {
    pub calls: AtomicU32,
    pub failures: u32,
    pub error: ClassifierError,
    pub response: ClassifierResponse,
}

impl FlakyClassifier {
    pub fn new(failures: u32, error: ClassifierError, response: ClassifierResponse) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures,
            error,
            response,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SemanticClassifier for FlakyClassifier {
    async fn classify(&self, _request: &ClassifierRequest) -> Result<ClassifierResponse, ClassifierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(self.error.clone());
        }
        Ok(self.response.clone())
    }
}

/// Records the request it was given.
pub struct RecordingClassifier {
    pub seen: std::sync::Mutex<Option<(u32, u32, String, usize)>>,
}

impl SemanticClassifier for RecordingClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<ClassifierResponse, ClassifierError> {
        *self.seen.lock().unwrap() = Some((
            request.width,
            request.height,
            request.prompt.clone(),
            request.image_png.len(),
        ));
        Ok(response(Vec::new()))
    }
}
