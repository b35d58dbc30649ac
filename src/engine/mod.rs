//! TTS Engine orchestrator.
//!
//! This module provides the engine that gates each request on license
//! consent and prompt length, resolves the reference clip, calls the
//! backend and hands the result to the waveform renderer.

mod language;
mod tts;

pub use language::{Language, UnsupportedLanguage};
pub use tts::{
    CONSENT_WARNING, LoadedModel, MIN_PROMPT_CHARS, PredictRequest, Prediction, Speaker,
    TTSEngine, TTSError,
};
