//! Application settings.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::cli::{Args, BackendKind, Device};

use super::ConfigError;

/// Default model identifier loaded on the backend.
pub const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v1";

/// Environment variable prefix, e.g. `XTTS_DEMO__SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "XTTS_DEMO";

/// Main application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub waveform: WaveformSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Predictions allowed to run at once; the rest queue.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Maximum request body size (reference uploads included).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Model server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    pub url: String,

    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub device: Device,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Gradio only: delay between result polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Gradio only: polls before giving up.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Gradio only: API name of the prediction endpoint.
    #[serde(default = "default_api_name")]
    pub api_name: String,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Age in seconds after which uploads and outputs are deleted; 0 keeps them.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

/// Waveform video rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_bar_count")]
    pub bar_count: usize,

    /// Fraction of each bar slot that is filled.
    #[serde(default = "default_bar_width")]
    pub bar_width: f32,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_bars_color_start")]
    pub bars_color_start: String,

    #[serde(default = "default_bars_color_end")]
    pub bars_color_end: String,

    #[serde(default = "default_bg_color")]
    pub bg_color: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_max_concurrent_jobs() -> usize {
    1
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_backend_url() -> String {
    "http://localhost:8020".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    300
}

fn default_api_name() -> String {
    "predict".to_string()
}

fn cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("xtts-demo")
}

fn default_output_dir() -> PathBuf {
    cache_root().join("outputs")
}

fn default_uploads_dir() -> PathBuf {
    cache_root().join("uploads")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_cleanup_interval_secs() -> u64 {
    10 * 60
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_bar_count() -> usize {
    50
}

fn default_bar_width() -> f32 {
    0.6
}

fn default_width() -> u32 {
    1000
}

fn default_height() -> u32 {
    400
}

fn default_bars_color_start() -> String {
    "#f97316".to_string()
}

fn default_bars_color_end() -> String {
    "#c2410c".to_string()
}

fn default_bg_color() -> String {
    "#f3f4f6".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            kind: BackendKind::default(),
            model: default_model(),
            device: Device::default(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            api_name: default_api_name(),
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            uploads_dir: default_uploads_dir(),
            assets_dir: default_assets_dir(),
            retention_secs: default_retention_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg: default_ffmpeg(),
            bar_count: default_bar_count(),
            bar_width: default_bar_width(),
            width: default_width(),
            height: default_height(),
            bars_color_start: default_bars_color_start(),
            bars_color_end: default_bars_color_end(),
            bg_color: default_bg_color(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Settings {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(url) = &args.backend_url {
            self.backend.url = url.clone();
        }
        if let Some(kind) = args.backend {
            self.backend.kind = kind;
        }
        if let Some(model) = &args.model {
            self.backend.model = model.clone();
        }
        if let Some(device) = args.device {
            self.backend.device = device;
        }
        if let Some(dir) = &args.output_dir {
            self.paths.output_dir = dir.clone();
        }
        if let Some(dir) = &args.assets_dir {
            self.paths.assets_dir = dir.clone();
        }
        if let Some(ffmpeg) = &args.ffmpeg {
            self.waveform.ffmpeg = ffmpeg.clone();
        }
        if args.no_waveform {
            self.waveform.enabled = false;
        }
        if args.verbose {
            self.logging.level = "debug".to_string();
        }
        if args.log_json {
            self.logging.json = true;
        }
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be non-zero"));
        }
        if self.server.max_concurrent_jobs == 0 {
            return Err(invalid("server.max_concurrent_jobs", "must be at least 1"));
        }
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::MissingField("backend.url".to_string()));
        }
        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::MissingField("backend.model".to_string()));
        }
        if self.backend.max_poll_attempts == 0 {
            return Err(invalid("backend.max_poll_attempts", "must be at least 1"));
        }
        if self.paths.retention_secs > 0 && self.paths.cleanup_interval_secs == 0 {
            return Err(invalid(
                "paths.cleanup_interval_secs",
                "must be non-zero while retention is enabled",
            ));
        }
        self.waveform.validate()
    }
}

impl WaveformSettings {
    /// Validate rendering parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bar_count == 0 {
            return Err(invalid("waveform.bar_count", "must be at least 1"));
        }
        if !(self.bar_width > 0.0 && self.bar_width <= 1.0) {
            return Err(invalid("waveform.bar_width", "must be in (0, 1]"));
        }
        // libx264 with yuv420p needs even dimensions
        if self.width == 0 || self.height == 0 || self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(invalid(
                "waveform.width/height",
                "must be non-zero and even",
            ));
        }
        for (field, value) in [
            ("waveform.bars_color_start", &self.bars_color_start),
            ("waveform.bars_color_end", &self.bars_color_end),
            ("waveform.bg_color", &self.bg_color),
        ] {
            if crate::waveform::Rgb::parse_hex(value).is_none() {
                return Err(invalid(field, &format!("'{value}' is not a #rrggbb colour")));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Load settings from defaults, an optional TOML file and the environment.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_layered(path, None)
}

/// Layer the file and environment sources.
///
/// `env` replaces the process environment when given.
pub(crate) fn load_layered(
    path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
