pub mod cache;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod semantic;

pub use cache::{AnalysisCache, CacheKey};
pub use config::{AnalysisConfig, GeometricRules, MergePolicy};
pub use detection::mask::BinaryMask;
pub use detection::{ElementDetector, GeometricDetection, build_standard_pipeline};
pub use error::{ClassifierError, DetectionError, Result};
pub use models::{
    AnalysisResult, BoundingBox, ConnectedComponent, DetectedElement, ElementCategory,
    ProcessingMetadata, QualityTier,
};
pub use pipeline::{MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep, StageRaster};
pub use semantic::{
    ClassifierAdapter, ClassifierRequest, ClassifierResponse, NullClassifier, SemanticCandidate,
    SemanticClassifier, StaticClassifier,
};
