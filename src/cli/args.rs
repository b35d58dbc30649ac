//! CLI argument definitions.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Web demo for multilingual voice cloning with XTTS.
///
/// Every flag overrides the matching value from the config file and the
/// `XTTS_DEMO__*` environment variables.
#[derive(Parser, Debug, Default)]
#[command(name = "xtts-demo")]
#[command(about = "Browser demo for XTTS multilingual voice cloning")]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind the web server to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the web server to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Base URL of the model server
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Wire protocol of the model server: "rest" or "gradio"
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Model identifier to load on the backend
    #[arg(short, long)]
    pub model: Option<String>,

    /// Device to place the model on
    #[arg(short, long, value_enum)]
    pub device: Option<Device>,

    /// Directory for synthesized audio and waveform videos
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding the bundled example speaker clips
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Skip the waveform video and return audio only
    #[arg(long)]
    pub no_waveform: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Wire protocol spoken by the model server.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Plain HTTP model server (`/health`, `/load`, `/tts_to_file`)
    #[default]
    #[value(name = "rest")]
    Rest,

    /// Gradio app hosting the model (`/gradio_api/...`)
    #[value(name = "gradio")]
    Gradio,
}

impl BackendKind {
    /// Returns the CLI argument string for this backend kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Rest => "rest",
            BackendKind::Gradio => "gradio",
        }
    }

    pub fn is_gradio(&self) -> bool {
        matches!(self, BackendKind::Gradio)
    }
}

/// Compute device for the model.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// CUDA when the backend reports it, CPU otherwise
    #[default]
    #[value(name = "auto")]
    Auto,

    #[value(name = "cuda")]
    Cuda,

    #[value(name = "cpu")]
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    /// Resolve a preference against what the backend offers.
    ///
    /// Returns `None` when CUDA is demanded but unavailable.
    pub fn resolve(self, cuda_available: bool) -> Option<Device> {
        match self {
            Device::Auto if cuda_available => Some(Device::Cuda),
            Device::Auto => Some(Device::Cpu),
            Device::Cuda if cuda_available => Some(Device::Cuda),
            Device::Cuda => None,
            Device::Cpu => Some(Device::Cpu),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
