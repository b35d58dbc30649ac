//! Bar computation and still-frame rendering.

use std::io::Write;
use std::path::Path;

use super::WaveformError;

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// Parse a `#rrggbb` colour.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
    }

    /// Linear blend, `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb([
            mix(self.0[0], other.0[0]),
            mix(self.0[1], other.0[1]),
            mix(self.0[2], other.0[2]),
        ])
    }
}

/// Decoded audio, down-mixed to mono.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Read a WAV file and down-mix it to mono `-1.0..=1.0` samples.
pub fn read_mono(path: &Path) -> Result<MonoAudio, WaveformError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Peak amplitude per bar, normalised so the loudest bar is `1.0`.
///
/// Silent or empty audio yields all-zero bars.
pub fn compute_bars(samples: &[f32], bar_count: usize) -> Vec<f32> {
    if bar_count == 0 {
        return Vec::new();
    }
    if samples.is_empty() {
        return vec![0.0; bar_count];
    }

    let len = samples.len();
    let mut bars: Vec<f32> = (0..bar_count)
        .map(|i| {
            let start = i * len / bar_count;
            let end = ((i + 1) * len / bar_count).max(start + 1).min(len);
            samples[start.min(len - 1)..end]
                .iter()
                .fold(0.0f32, |peak, s| peak.max(s.abs()))
        })
        .collect();

    let max = bars.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for bar in &mut bars {
            *bar /= max;
        }
    }
    bars
}

/// Colours and geometry for a rendered frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameStyle {
    pub width: u32,
    pub height: u32,
    pub bar_width: f32,
    pub start: Rgb,
    pub end: Rgb,
    pub background: Rgb,
}

/// Render bars mirrored around the vertical centre into an RGB24 buffer.
pub fn render_frame(bars: &[f32], style: &FrameStyle) -> Vec<u8> {
    let width = style.width as usize;
    let height = style.height as usize;
    let mut pixels = Vec::with_capacity(width * height * 3);
    for _ in 0..width * height {
        pixels.extend_from_slice(&style.background.0);
    }
    if bars.is_empty() || width == 0 || height == 0 {
        return pixels;
    }

    let slot = width as f32 / bars.len() as f32;
    let bar_px = ((slot * style.bar_width).round() as usize).max(1);
    let centre = height / 2;
    // keep a small margin so full-scale bars do not touch the edges
    let max_half = (height as f32 * 0.45).max(1.0);

    for (i, amp) in bars.iter().enumerate() {
        let t = if bars.len() > 1 {
            i as f32 / (bars.len() - 1) as f32
        } else {
            0.0
        };
        let colour = style.start.lerp(style.end, t);

        let half = ((amp.clamp(0.0, 1.0) * max_half).round() as usize).max(1);
        let x0 = (i as f32 * slot + (slot - bar_px as f32) / 2.0).max(0.0) as usize;
        let x1 = (x0 + bar_px).min(width);
        let y0 = centre.saturating_sub(half);
        let y1 = (centre + half).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                let offset = (y * width + x) * 3;
                pixels[offset..offset + 3].copy_from_slice(&colour.0);
            }
        }
    }

    pixels
}

/// Write an RGB24 buffer as a binary PPM (`P6`) image.
pub fn write_ppm(path: &Path, width: u32, height: u32, pixels: &[u8]) -> Result<(), WaveformError> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write!(file, "P6\n{width} {height}\n255\n")?;
    file.write_all(pixels)?;
    file.flush()?;
    Ok(())
}
