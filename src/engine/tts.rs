//! TTS Engine implementation.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::{Backend, BackendError, HealthResponse, LoadRequest, SynthesizeRequest};
use crate::cli::Device;
use crate::config::DEFAULT_MODEL;
use crate::reference::{ReferenceError, ReferenceStore};
use crate::waveform::{WaveformError, WaveformRenderer};

use super::Language;

/// Shortest prompt, in characters, that is sent to the model.
pub const MIN_PROMPT_CHARS: usize = 2;

/// Warning shown when the license box is left unchecked.
pub const CONSENT_WARNING: &str =
    "Please accept the Terms & Conditions of the model by checking the box!";

/// Errors that can occur during TTS operations.
#[derive(Error, Debug)]
pub enum TTSError {
    #[error("Please give a longer text prompt")]
    PromptTooShort,

    #[error("No reference audio provided")]
    MissingReference,

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("Device {0} is not available on the backend")]
    DeviceUnavailable(Device),

    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    #[error("Waveform error: {0}")]
    Waveform(#[from] WaveformError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Where the reference speaker clip comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Speaker {
    /// A clip already on disk.
    File(PathBuf),
    /// A bundled example clip, by file name.
    Example(String),
    /// Raw WAV bytes uploaded or recorded in the browser.
    Upload(Vec<u8>),
}

/// One form submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub prompt: String,
    pub language: Language,
    pub speaker: Option<Speaker>,
    /// Whether the model license terms have been accepted.
    pub agree: bool,
}

/// Outcome of a prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Consent was not given; nothing was synthesized.
    Declined { warning: &'static str },
    /// Speech was synthesized.
    Synthesized {
        audio: PathBuf,
        /// Absent when waveform rendering is disabled.
        video: Option<PathBuf>,
    },
}

impl Prediction {
    pub fn audio(&self) -> Option<&Path> {
        match self {
            Prediction::Synthesized { audio, .. } => Some(audio),
            Prediction::Declined { .. } => None,
        }
    }

    pub fn video(&self) -> Option<&Path> {
        match self {
            Prediction::Synthesized { video, .. } => video.as_deref(),
            Prediction::Declined { .. } => None,
        }
    }

    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Prediction::Declined { warning } => Some(*warning),
            Prediction::Synthesized { .. } => None,
        }
    }
}

/// Model placement reported after loading.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: String,
    pub device: Device,
    pub health: HealthResponse,
}

/// The main TTS engine that orchestrates between components.
pub struct TTSEngine<B: Backend> {
    backend: B,
    references: ReferenceStore,
    waveform: Option<Box<dyn WaveformRenderer>>,
    output_dir: PathBuf,
    model: String,
    device: Device,
    loaded: OnceLock<LoadedModel>,
}

impl<B: Backend> TTSEngine<B> {
    /// Create a new TTS engine.
    pub fn new(backend: B, references: ReferenceStore, output_dir: PathBuf) -> Self {
        Self {
            backend,
            references,
            waveform: None,
            output_dir,
            model: DEFAULT_MODEL.to_string(),
            device: Device::Auto,
            loaded: OnceLock::new(),
        }
    }

    /// Set the model identifier and device preference used by [`Self::load`].
    pub fn with_model(mut self, model: impl Into<String>, device: Device) -> Self {
        self.model = model.into();
        self.device = device;
        self
    }

    /// Render a waveform video for every synthesized clip.
    pub fn with_waveform(mut self, renderer: Box<dyn WaveformRenderer>) -> Self {
        self.waveform = Some(renderer);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The model placement, once [`Self::load`] has succeeded.
    pub fn loaded(&self) -> Option<&LoadedModel> {
        self.loaded.get()
    }

    /// Check backend health status.
    pub fn health_check(&self) -> Result<HealthResponse, TTSError> {
        Ok(self.backend.health()?)
    }

    /// Load the model and place it on a device.
    ///
    /// `auto` resolves to CUDA when the backend has it. Runs once; later
    /// calls return the first placement.
    pub fn load(&self) -> Result<&LoadedModel, TTSError> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let health = self.backend.health()?;
        let device = self
            .device
            .resolve(health.cuda_available)
            .ok_or(TTSError::DeviceUnavailable(self.device))?;

        tracing::info!(model = %self.model, %device, gpu = ?health.gpu, "Loading model");

        let health = self.backend.load_model(&LoadRequest {
            model: self.model.clone(),
            device,
        })?;

        Ok(self.loaded.get_or_init(|| LoadedModel {
            model: self.model.clone(),
            device,
            health,
        }))
    }

    /// Run one prediction.
    ///
    /// Consent is checked before anything else, then prompt length. Only
    /// then is the reference clip resolved and the backend called.
    pub fn predict(&self, request: &PredictRequest) -> Result<Prediction, TTSError> {
        if !request.agree {
            tracing::warn!("Prediction declined: license terms not accepted");
            return Ok(Prediction::Declined {
                warning: CONSENT_WARNING,
            });
        }

        if request.prompt.chars().count() < MIN_PROMPT_CHARS {
            return Err(TTSError::PromptTooShort);
        }

        let speaker_wav = self.resolve_speaker(request.speaker.as_ref())?;
        let started = Instant::now();

        let synth = SynthesizeRequest::new(&request.prompt, request.language, speaker_wav);
        let audio_data = self.backend.synthesize(&synth)?;

        std::fs::create_dir_all(&self.output_dir)?;
        let audio = self.output_dir.join(output_file_name());
        std::fs::write(&audio, &audio_data)?;

        let video = match &self.waveform {
            Some(renderer) => Some(renderer.make_waveform(&audio)?),
            None => None,
        };

        tracing::info!(
            language = %request.language,
            prompt_chars = request.prompt.chars().count(),
            audio = %audio.display(),
            has_video = video.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prediction complete"
        );

        Ok(Prediction::Synthesized { audio, video })
    }

    fn resolve_speaker(&self, speaker: Option<&Speaker>) -> Result<PathBuf, TTSError> {
        match speaker {
            None => Err(TTSError::MissingReference),
            Some(Speaker::File(path)) => {
                if !path.exists() {
                    return Err(ReferenceError::NotFound(path.display().to_string()).into());
                }
                Ok(path.clone())
            }
            Some(Speaker::Example(name)) => Ok(self.references.resolve_asset(name)?),
            Some(Speaker::Upload(bytes)) => Ok(self.references.save_upload(bytes)?.path),
        }
    }
}

/// Unique name for a synthesized clip.
fn output_file_name() -> String {
    format!(
        "{}-{}.wav",
        Utc::now().format("%Y%m%dT%H%M%S"),
        Uuid::new_v4().simple()
    )
}
