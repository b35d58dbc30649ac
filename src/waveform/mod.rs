//! Animated waveform videos for synthesized audio.
//!
//! The audio is reduced to a row of peak bars, drawn onto a still frame and
//! handed to ffmpeg together with the audio. ffmpeg sweeps a translucent bar
//! across the frame for the length of the clip.

mod render;
mod video;

pub use render::{FrameStyle, MonoAudio, Rgb, compute_bars, read_mono, render_frame, write_ppm};
pub use video::{VideoJob, run_ffmpeg};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::WaveformSettings;

/// Shortest clip that still yields a non-zero duration in the ffmpeg arguments.
pub const MIN_VIDEO_SECS: f64 = 0.001;

/// Errors that can occur while building a waveform video.
#[derive(Error, Debug)]
pub enum WaveformError {
    #[error("Invalid audio: {0}")]
    InvalidAudio(#[from] hound::Error),

    #[error("Audio is empty")]
    EmptyAudio,

    #[error("Invalid waveform settings: {0}")]
    InvalidSettings(String),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that turns an audio file into a waveform video.
#[cfg_attr(test, mockall::automock)]
pub trait WaveformRenderer: Send + Sync {
    /// Build a video next to `audio` and return its path.
    fn make_waveform(&self, audio: &Path) -> Result<PathBuf, WaveformError>;
}

/// Renders waveform videos with ffmpeg.
pub struct FfmpegWaveform {
    settings: WaveformSettings,
}

impl FfmpegWaveform {
    pub fn new(settings: WaveformSettings) -> Self {
        Self { settings }
    }

    fn style(&self) -> Result<FrameStyle, WaveformError> {
        let colour = |value: &str| {
            Rgb::parse_hex(value)
                .ok_or_else(|| WaveformError::InvalidSettings(format!("bad colour '{value}'")))
        };

        Ok(FrameStyle {
            width: self.settings.width,
            height: self.settings.height,
            bar_width: self.settings.bar_width,
            start: colour(&self.settings.bars_color_start)?,
            end: colour(&self.settings.bars_color_end)?,
            background: colour(&self.settings.bg_color)?,
        })
    }

    /// Render the still frame for `audio` into `frame_path`.
    ///
    /// Returns the clip duration in seconds.
    pub fn render_still(&self, audio: &Path, frame_path: &Path) -> Result<f64, WaveformError> {
        let mono = read_mono(audio)?;
        let duration = mono.duration_secs();
        if duration < MIN_VIDEO_SECS {
            return Err(WaveformError::EmptyAudio);
        }

        let style = self.style()?;
        let bars = compute_bars(&mono.samples, self.settings.bar_count);
        let pixels = render_frame(&bars, &style);
        write_ppm(frame_path, style.width, style.height, &pixels)?;

        Ok(duration)
    }
}

impl WaveformRenderer for FfmpegWaveform {
    fn make_waveform(&self, audio: &Path) -> Result<PathBuf, WaveformError> {
        let frame = audio.with_extension("ppm");
        let output = audio.with_extension("mp4");

        let duration_secs = self.render_still(audio, &frame)?;

        let job = VideoJob {
            frame: &frame,
            audio,
            output: &output,
            width: self.settings.width,
            height: self.settings.height,
            duration_secs,
        };
        let result = run_ffmpeg(&self.settings.ffmpeg, &job);

        if let Err(e) = std::fs::remove_file(&frame) {
            tracing::debug!(frame = %frame.display(), "Could not remove still frame: {e}");
        }

        result
    }
}
