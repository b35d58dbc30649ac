//! ffmpeg invocation turning a still frame and audio into a waveform video.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::WaveformError;

/// Translucent progress bar swept across the frame while audio plays.
const PROGRESS_COLOR: &str = "#FFFFFF77";

/// Inputs for one ffmpeg run.
#[derive(Debug, Clone)]
pub struct VideoJob<'a> {
    pub frame: &'a Path,
    pub audio: &'a Path,
    pub output: &'a Path,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

impl VideoJob<'_> {
    /// Filter graph sliding the progress bar from left to right over the clip.
    pub fn filter_graph(&self) -> String {
        format!(
            "color=c={PROGRESS_COLOR}:s={w}x{h}[bar];[0][bar]overlay=-w+(w/{d:.3})*t:H-h:shortest=1[v]",
            w = self.width,
            h = self.height,
            d = self.duration_secs,
        )
    }

    /// Full ffmpeg argument list.
    pub fn args(&self) -> Vec<OsString> {
        let duration = format!("{:.3}", self.duration_secs);
        let filter = self.filter_graph();

        let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-loop", "1", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(self.frame.as_os_str().to_owned());
        args.push("-i".into());
        args.push(self.audio.as_os_str().to_owned());
        for a in [
            "-filter_complex",
            filter.as_str(),
            "-map",
            "[v]",
            "-map",
            "1:a",
            "-t",
            duration.as_str(),
            "-c:v",
            "libx264",
            "-tune",
            "stillimage",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
        ] {
            args.push(a.into());
        }
        args.push(self.output.as_os_str().to_owned());
        args
    }
}

/// Run ffmpeg for a job, returning the output path.
pub fn run_ffmpeg(ffmpeg: &Path, job: &VideoJob<'_>) -> Result<PathBuf, WaveformError> {
    tracing::debug!(ffmpeg = %ffmpeg.display(), output = %job.output.display(), "Rendering waveform video");

    let output = Command::new(ffmpeg)
        .args(job.args())
        .output()
        .map_err(|e| WaveformError::Ffmpeg(format!("failed to launch {}: {e}", ffmpeg.display())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WaveformError::Ffmpeg(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(job.output.to_path_buf())
}
