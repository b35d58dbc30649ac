//! HTTP client for backend communication.

use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};

use crate::cli::BackendKind;
use crate::config::BackendSettings;
use crate::engine::Language;

use super::Backend;
use super::types::{BackendError, HealthResponse, LoadRequest, SynthesizeRequest};

/// HTTP-based backend client.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
    kind: BackendKind,
    api_name: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl HttpBackend {
    /// Create a new HTTP backend client with default polling parameters.
    pub fn new(kind: BackendKind, base_url: &str) -> Self {
        let defaults = BackendSettings::default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
            kind,
            api_name: defaults.api_name,
            poll_interval: Duration::from_millis(defaults.poll_interval_ms),
            max_poll_attempts: defaults.max_poll_attempts,
        }
    }

    /// Create a backend client from settings.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            client,
            kind: settings.kind,
            api_name: settings.api_name.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_poll_attempts: settings.max_poll_attempts,
        })
    }

    /// Get the base URL for this backend.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Build a multipart file part from a reference clip.
    fn audio_part(audio_path: &Path) -> Result<Part, BackendError> {
        let audio_data = std::fs::read(audio_path)
            .map_err(|_| BackendError::FileNotFound(audio_path.display().to_string()))?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("speaker.wav");

        Part::bytes(audio_data)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")
            .map_err(|e| BackendError::RequestFailed(e.to_string()))
    }

    /// Upload a file to Gradio backend, returns the server path.
    fn gradio_upload(&self, audio_path: &Path) -> Result<String, BackendError> {
        let url = format!("{}/gradio_api/upload", self.base_url);
        let form = Form::new().part("files", Self::audio_part(audio_path)?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Upload failed: {}",
                response.status()
            )));
        }

        let paths: Vec<String> = response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        paths
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("No path returned".to_string()))
    }

    /// Call the Gradio prediction endpoint and wait for the audio result.
    fn gradio_predict(
        &self,
        text: &str,
        language: Language,
        server_path: &str,
    ) -> Result<Vec<u8>, BackendError> {
        let url = format!("{}/gradio_api/call/{}", self.base_url, self.api_name);

        // Order: [prompt, language, speaker_wav, agree]
        let body = serde_json::json!({
            "data": [
                text,
                language.code(),
                {
                    "path": server_path,
                    "meta": {"_type": "gradio.FileData"}
                },
                true
            ]
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Predict call failed: {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct EventResponse {
            event_id: String,
        }

        let event: EventResponse = response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        tracing::debug!(event_id = %event.event_id, "Gradio prediction queued");

        let poll_url = format!("{url}/{}", event.event_id);

        for attempt in 1..=self.max_poll_attempts {
            thread::sleep(self.poll_interval);

            let text = self
                .client
                .get(&poll_url)
                .send()
                .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?
                .text()
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

            if let Some(audio_url) = parse_sse_result(&text)? {
                tracing::debug!(attempt, %audio_url, "Gradio prediction complete");
                return self.download_audio(&audio_url);
            }
        }

        Err(BackendError::Timeout(self.max_poll_attempts))
    }

    /// Download audio from URL.
    fn download_audio(&self, url: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Download failed: {}",
                response.status()
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

/// Parse a Gradio server-sent-events poll body.
///
/// Returns `Ok(None)` while the prediction is still pending and the URL of
/// the last output carrying one once it completes.
pub(crate) fn parse_sse_result(body: &str) -> Result<Option<String>, BackendError> {
    if body.contains("event: error") {
        let detail = body
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .filter(|data| *data != "null")
            .unwrap_or("Generation failed");
        return Err(BackendError::Engine(detail.to_string()));
    }

    if !body.contains("event: complete") {
        return Ok(None);
    }

    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            let parsed: serde_json::Value = serde_json::from_str(data)
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

            let url = parsed
                .as_array()
                .and_then(|outputs| {
                    outputs
                        .iter()
                        .rev()
                        .find_map(|v| v.get("url").and_then(|u| u.as_str()))
                })
                .map(str::to_string);

            if url.is_some() {
                return Ok(url);
            }
        }
    }

    Err(BackendError::InvalidResponse(
        "No audio URL in response".to_string(),
    ))
}

impl Backend for HttpBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        if self.kind.is_gradio() {
            // For Gradio backends, check /config endpoint
            let url = format!("{}/config", self.base_url);
            let response = self
                .client
                .get(&url)
                .send()
                .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

            if response.status().is_success() {
                // Device placement is owned by the Gradio app
                return Ok(HealthResponse {
                    status: "healthy".to_string(),
                    model: "gradio".to_string(),
                    cuda_available: false,
                    gpu: None,
                    device: "remote".to_string(),
                });
            }
            return Err(BackendError::RequestFailed(format!(
                "Status: {}",
                response.status()
            )));
        }

        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Status: {}",
                response.status()
            )));
        }

        response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn load_model(&self, request: &LoadRequest) -> Result<HealthResponse, BackendError> {
        if self.kind.is_gradio() {
            // The Gradio app loads its model at startup
            return self.health();
        }

        let url = format!("{}/load", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "Load failed: {}",
                response.status()
            )));
        }

        response
            .json()
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError> {
        if self.kind.is_gradio() {
            let server_path = self.gradio_upload(&request.speaker_wav)?;
            return self.gradio_predict(&request.text, request.language, &server_path);
        }

        let url = format!("{}/tts_to_file", self.base_url);

        let form = Form::new()
            .text("text", request.text.clone())
            .text("language", request.language.code())
            .part("speaker_wav", Self::audio_part(&request.speaker_wav)?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .map_err(|e| BackendError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().unwrap_or_default();
            return Err(BackendError::Engine(format!("{status}: {detail}")));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
