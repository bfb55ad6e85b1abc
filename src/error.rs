use thiserror::Error;

/// Fatal errors raised by the detection engine.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid morphological configuration: {0}")]
    MorphologicalConfig(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Image encoding error: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the semantic classifier boundary.
///
/// These never abort an analysis: the detector falls back to geometric-only
/// results and records the error as a warning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Classifier timed out after {0}ms")]
    Timeout(u64),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier transport failure: {0}")]
    Transport(String),

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("Classifier failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ClassifierError>,
    },
}

impl ClassifierError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifierError::Timeout(_) | ClassifierError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, DetectionError>;
