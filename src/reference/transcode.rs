//! Conversion of non-WAV reference uploads with ffmpeg.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use super::ReferenceError;

/// ffmpeg arguments decoding `input` into 16-bit PCM WAV at `output`.
pub fn transcode_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-loglevel", "error", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    for a in ["-vn", "-c:a", "pcm_s16le"] {
        args.push(a.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

/// Decode any audio ffmpeg understands into a WAV file.
pub fn transcode_to_wav(ffmpeg: &Path, input: &Path, output: &Path) -> Result<(), ReferenceError> {
    tracing::debug!(ffmpeg = %ffmpeg.display(), input = %input.display(), "Converting reference upload to WAV");

    let result = Command::new(ffmpeg)
        .args(transcode_args(input, output))
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                ReferenceError::TranscoderUnavailable(format!("{}: {e}", ffmpeg.display()))
            }
            _ => ReferenceError::Transcode(format!("failed to launch {}: {e}", ffmpeg.display())),
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ReferenceError::Transcode(format!(
            "exited with {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    Ok(())
}
