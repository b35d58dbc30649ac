//! HTTP endpoints.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::backend::{Backend, HealthResponse};
use crate::engine::{Language, PredictRequest, Prediction, Speaker, UnsupportedLanguage};
use crate::reference::{DEFAULT_PROMPT, DEFAULT_SPEAKER, Example, examples};

use super::ServerError;
use super::page::{PageContext, TITLE, render_index};
use super::state::AppState;

/// Create the application router.
pub fn create_router<B: Backend + 'static>(state: AppState<B>) -> Router {
    let output_dir = state.engine.output_dir().to_path_buf();
    let assets_dir = state.assets_dir.clone();
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(index::<B>))
        .route("/api/predict", post(predict::<B>))
        .route("/api/info", get(info::<B>))
        .route("/health", get(health::<B>))
        .nest_service("/files", ServeDir::new(output_dir))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Prediction response.
///
/// Mirrors the two output widgets plus the consent warning.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub warning: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
}

impl PredictResponse {
    fn from_prediction(prediction: &Prediction) -> Self {
        Self {
            warning: prediction.warning().map(str::to_string),
            video: prediction.video().and_then(file_url),
            audio: prediction.audio().and_then(file_url),
        }
    }
}

/// URL under `/files` for a generated output.
fn file_url(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| format!("/files/{name}"))
}

#[derive(Debug, Serialize)]
struct LanguageOption {
    code: &'static str,
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    title: &'static str,
    model: String,
    device: Option<String>,
    languages: Vec<LanguageOption>,
    default_language: Language,
    default_prompt: &'static str,
    default_speaker: &'static str,
    examples: Vec<Example>,
}

/// Render the demo page.
async fn index<B: Backend + 'static>(State(state): State<AppState<B>>) -> Html<String> {
    let device = state.engine.loaded().map(|l| l.device.to_string());

    Html(render_index(&PageContext {
        model: state.engine.model(),
        device: device.as_deref(),
        default_language: Language::default(),
        default_prompt: DEFAULT_PROMPT,
        default_speaker: DEFAULT_SPEAKER,
        examples: &examples(),
    }))
}

/// Describe the form: languages, defaults and examples.
async fn info<B: Backend + 'static>(State(state): State<AppState<B>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        title: TITLE,
        model: state.engine.model().to_string(),
        device: state.engine.loaded().map(|l| l.device.to_string()),
        languages: Language::ALL
            .iter()
            .map(|l| LanguageOption {
                code: l.code(),
                name: l.name(),
            })
            .collect(),
        default_language: Language::default(),
        default_prompt: DEFAULT_PROMPT,
        default_speaker: DEFAULT_SPEAKER,
        examples: examples(),
    })
}

/// Backend health passthrough.
async fn health<B: Backend + 'static>(
    State(state): State<AppState<B>>,
) -> Result<Json<HealthResponse>, ServerError> {
    let engine = Arc::clone(&state.engine);

    let health = tokio::task::spawn_blocking(move || engine.health_check())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(|e| ServerError::Unavailable(e.to_string()))?;

    Ok(Json(health))
}

/// Run one prediction from the submitted form.
async fn predict<B: Backend + 'static>(
    State(state): State<AppState<B>>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, ServerError> {
    let request = read_predict_form(multipart).await?;

    tracing::debug!(
        language = %request.language,
        agree = request.agree,
        "Prediction requested"
    );

    // Queue behind running jobs
    let _permit = Arc::clone(&state.jobs)
        .acquire_owned()
        .await
        .map_err(|_| ServerError::Internal("Job queue closed".to_string()))?;

    let engine = Arc::clone(&state.engine);
    let prediction = tokio::task::spawn_blocking(move || engine.predict(&request))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(PredictResponse::from_prediction(&prediction)))
}

fn form_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ServerError::PayloadTooLarge;
    }
    ServerError::InvalidRequest(err.body_text())
}

/// HTML checkboxes submit "on"; API clients tend to send "true" or "1".
fn parse_checkbox(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}

/// Collect the predict form fields.
///
/// An uploaded or recorded clip wins over an example clip name.
async fn read_predict_form(mut multipart: Multipart) -> Result<PredictRequest, ServerError> {
    let mut prompt = String::new();
    let mut language_code: Option<String> = None;
    let mut agree = false;
    let mut upload: Option<Vec<u8>> = None;
    let mut example: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "prompt" => prompt = field.text().await.map_err(form_error)?,
            "language" => language_code = Some(field.text().await.map_err(form_error)?),
            "agree" => agree = parse_checkbox(&field.text().await.map_err(form_error)?),
            "speaker_wav" => {
                let bytes = field.bytes().await.map_err(form_error)?;
                // browsers send an empty part when no file is chosen
                if !bytes.is_empty() {
                    upload = Some(bytes.to_vec());
                }
            }
            "example_speaker" => {
                let value = field.text().await.map_err(form_error)?;
                let value = value.trim();
                if !value.is_empty() {
                    example = Some(value.to_string());
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    // unknown languages are only an error once consent is given
    let language = match language_code {
        None => Language::default(),
        Some(code) if agree => code
            .parse()
            .map_err(|e: UnsupportedLanguage| ServerError::InvalidRequest(e.to_string()))?,
        Some(code) => code.parse().unwrap_or_default(),
    };

    let speaker = upload
        .map(Speaker::Upload)
        .or_else(|| example.map(Speaker::Example));

    Ok(PredictRequest {
        prompt,
        language,
        speaker,
        agree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkbox() {
        for value in ["on", "true", "TRUE", "1", " yes "] {
            assert!(parse_checkbox(value), "{value:?} should be checked");
        }
        for value in ["", "off", "false", "0"] {
            assert!(!parse_checkbox(value), "{value:?} should be unchecked");
        }
    }

    #[test]
    fn test_file_url() {
        assert_eq!(
            file_url(Path::new("/var/cache/xtts-demo/outputs/a.wav")).as_deref(),
            Some("/files/a.wav")
        );
    }

    #[test]
    fn test_predict_response_declined() {
        let response = PredictResponse::from_prediction(&Prediction::Declined {
            warning: crate::engine::CONSENT_WARNING,
        });

        assert!(response.warning.is_some());
        assert!(response.audio.is_none());
        assert!(response.video.is_none());
    }
}
