//! Backend request/response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Device;
use crate::engine::Language;

/// Errors that can occur when communicating with the backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Synthesis timed out after {0} polls")]
    Timeout(u32),
}

/// Health check response from backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub cuda_available: bool,
    pub gpu: Option<String>,
    pub device: String,
}

/// Request to load a model onto a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub model: String,
    pub device: Device,
}

/// Request for speech synthesis with a cloned voice.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizeRequest {
    pub text: String,
    pub language: Language,
    /// Reference clip of the target speaker.
    pub speaker_wav: PathBuf,
}

impl SynthesizeRequest {
    /// Create a new synthesis request.
    pub fn new(text: impl Into<String>, language: Language, speaker_wav: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            language,
            speaker_wav: speaker_wav.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_request_new() {
        let request = SynthesizeRequest::new("Bonjour", Language::French, "/tmp/male.wav");

        assert_eq!(request.text, "Bonjour");
        assert_eq!(request.language, Language::French);
        assert_eq!(request.speaker_wav, PathBuf::from("/tmp/male.wav"));
    }

    #[test]
    fn test_health_response_deserialize() {
        let json = r#"{
            "status": "healthy",
            "model": "tts_models/multilingual/multi-dataset/xtts_v1",
            "cuda_available": true,
            "gpu": "NVIDIA A10G",
            "device": "cuda:0"
        }"#;

        let response: HealthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, "healthy");
        assert!(response.cuda_available);
        assert_eq!(response.gpu, Some("NVIDIA A10G".to_string()));
    }

    #[test]
    fn test_health_response_without_gpu() {
        let json = r#"{
            "status": "healthy",
            "model": "xtts_v1",
            "cuda_available": false,
            "gpu": null,
            "device": "cpu"
        }"#;

        let response: HealthResponse = serde_json::from_str(json).unwrap();
        assert!(!response.cuda_available);
        assert!(response.gpu.is_none());
    }

    #[test]
    fn test_load_request_serialize() {
        let request = LoadRequest {
            model: "xtts_v1".to_string(),
            device: Device::Cuda,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "xtts_v1");
        assert_eq!(json["device"], "cuda");
    }
}
