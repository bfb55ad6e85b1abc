#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from planscan for tests
pub use planscan::{
    AnalysisCache, AnalysisConfig, BinaryMask, BoundingBox, ClassifierError, DetectedElement,
    DetectionError, ElementCategory, ElementDetector, MergePolicy, NullClassifier, QualityTier,
    StaticClassifier,
};
