use std::path::Path;

use crate::error::ClassifierError;

use super::{ClassifierRequest, ClassifierResponse, SemanticClassifier, parse_response};

/// Stands in when no classifier is wired up; every call reports unavailability,
/// so the detector runs geometric-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClassifier;

impl SemanticClassifier for NullClassifier {
    async fn classify(&self, _request: &ClassifierRequest) -> Result<ClassifierResponse, ClassifierError> {
        Err(ClassifierError::Unavailable(
            "no semantic classifier configured".to_string(),
        ))
    }
}

/// Replays a recorded classifier payload.
///
/// The payload is parsed on every call, so a corrupt recording surfaces as a
/// malformed-response error exactly like a live classifier would.
#[derive(Debug, Clone)]
pub struct StaticClassifier {
    payload: String,
}

impl StaticClassifier {
    pub fn from_json(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Ok(Self::from_json(std::fs::read_to_string(path)?))
    }

    pub fn from_response(response: &ClassifierResponse) -> Self {
        let payload = serde_json::to_string(response).unwrap_or_default();
        Self { payload }
    }
}

impl SemanticClassifier for StaticClassifier {
    async fn classify(&self, _request: &ClassifierRequest) -> Result<ClassifierResponse, ClassifierError> {
        parse_response(&self.payload)
    }
}
