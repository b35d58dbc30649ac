//! xtts-demo: browser demo for multilingual voice cloning.
//!
//! A user supplies text, a target language and a short reference clip; the
//! app asks an XTTS model server to speak the text in that voice and returns
//! the audio together with an animated waveform video.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod reference;
pub mod server;
pub mod waveform;
