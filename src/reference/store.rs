//! Storage for reference speaker clips.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::transcode::transcode_to_wav;

/// XTTS is advertised to clone a voice from about three seconds of audio.
pub const MIN_REFERENCE_SECS: f32 = 3.0;

/// Errors that can occur while handling reference clips.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Reference audio not found: {0}")]
    NotFound(String),

    #[error("Invalid reference name: {0}")]
    InvalidName(String),

    #[error("Reference audio is empty")]
    Empty,

    #[error("Reference audio is not a readable WAV file: {0}")]
    InvalidAudio(#[from] hound::Error),

    #[error("Could not convert reference audio to WAV: {0}")]
    Transcode(String),

    #[error("Only WAV reference audio is accepted; converter unavailable ({0})")]
    TranscoderUnavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A reference clip on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceClip {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_secs: f32,
}

impl ReferenceClip {
    fn from_reader<R: std::io::Read>(path: PathBuf, reader: &hound::WavReader<R>) -> Self {
        let spec = reader.spec();
        // `duration` counts frames, not interleaved samples
        let duration_secs = if spec.sample_rate == 0 {
            0.0
        } else {
            reader.duration() as f32 / spec.sample_rate as f32
        };

        Self {
            path,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration_secs,
        }
    }

    pub fn is_short(&self) -> bool {
        self.duration_secs < MIN_REFERENCE_SECS
    }
}

/// Manages uploaded clips and bundled example clips.
pub struct ReferenceStore {
    uploads_dir: PathBuf,
    assets_dir: PathBuf,
    /// Converts non-WAV uploads when set.
    ffmpeg: Option<PathBuf>,
}

impl ReferenceStore {
    /// Create a store over an uploads directory and an assets directory.
    pub fn new(uploads_dir: PathBuf, assets_dir: PathBuf) -> Self {
        Self {
            uploads_dir,
            assets_dir,
            ffmpeg: None,
        }
    }

    /// Accept any audio format ffmpeg can decode, converting it to WAV.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(ffmpeg.into());
        self
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Validate a bundled clip name.
    fn validate_name(name: &str) -> Result<(), ReferenceError> {
        if name.is_empty() {
            return Err(ReferenceError::InvalidName(
                "Name cannot be empty".to_string(),
            ));
        }

        // Prevent path traversal
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ReferenceError::InvalidName(
                "Name cannot contain path separators".to_string(),
            ));
        }

        Ok(())
    }

    /// Store an uploaded or recorded clip under a fresh name.
    ///
    /// WAV uploads are stored as-is. Anything else is converted with ffmpeg
    /// when a converter is configured and rejected otherwise.
    pub fn save_upload(&self, bytes: &[u8]) -> Result<ReferenceClip, ReferenceError> {
        if bytes.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let stem = Uuid::new_v4().simple().to_string();
        let path = self.uploads_dir.join(format!("{stem}.wav"));

        let clip = match hound::WavReader::new(Cursor::new(bytes)) {
            Ok(reader) => {
                std::fs::create_dir_all(&self.uploads_dir)?;
                std::fs::write(&path, bytes)?;
                ReferenceClip::from_reader(path, &reader)
            }
            Err(wav_err) => {
                let Some(ffmpeg) = &self.ffmpeg else {
                    return Err(wav_err.into());
                };
                tracing::debug!("Upload is not WAV ({wav_err}); converting");
                self.convert_upload(ffmpeg, &stem, bytes, &path)?
            }
        };

        if clip.is_short() {
            tracing::warn!(
                duration_secs = clip.duration_secs,
                "Reference clip is shorter than {MIN_REFERENCE_SECS}s; cloning quality may suffer"
            );
        }
        tracing::debug!(path = %clip.path.display(), "Stored reference upload");

        Ok(clip)
    }

    fn convert_upload(
        &self,
        ffmpeg: &Path,
        stem: &str,
        bytes: &[u8],
        path: &Path,
    ) -> Result<ReferenceClip, ReferenceError> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        let raw = self.uploads_dir.join(format!("{stem}.upload"));
        std::fs::write(&raw, bytes)?;

        let result = transcode_to_wav(ffmpeg, &raw, path).and_then(|()| self.inspect(path));

        if let Err(e) = std::fs::remove_file(&raw) {
            tracing::debug!(raw = %raw.display(), "Could not remove raw upload: {e}");
        }
        if result.is_err() && path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), "Could not remove failed conversion: {e}");
            }
        }

        result
    }

    /// Resolve a bundled example clip by file name.
    pub fn resolve_asset(&self, name: &str) -> Result<PathBuf, ReferenceError> {
        Self::validate_name(name)?;

        let path = self.assets_dir.join(name);
        if !path.is_file() {
            return Err(ReferenceError::NotFound(name.to_string()));
        }

        Ok(path)
    }

    /// Read the header of a clip on disk.
    pub fn inspect(&self, path: &Path) -> Result<ReferenceClip, ReferenceError> {
        if !path.exists() {
            return Err(ReferenceError::NotFound(path.display().to_string()));
        }

        let reader = hound::WavReader::open(path)?;
        Ok(ReferenceClip::from_reader(path.to_path_buf(), &reader))
    }
}
