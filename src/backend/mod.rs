//! Backend communication with the XTTS model server.
//!
//! The model itself runs out of process. This module provides the trait the
//! engine talks to and an HTTP implementation that speaks either a plain
//! REST protocol or the Gradio client API.

mod client;
mod types;

pub use client::HttpBackend;
pub use types::{BackendError, HealthResponse, LoadRequest, SynthesizeRequest};

use crate::config::BackendSettings;

/// Trait for TTS backend communication.
///
/// This trait abstracts the HTTP communication with the model server,
/// allowing for mock implementations in tests.
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send + Sync {
    /// Check backend health status.
    fn health(&self) -> Result<HealthResponse, BackendError>;

    /// Load the model and place it on a device.
    fn load_model(&self, request: &LoadRequest) -> Result<HealthResponse, BackendError>;

    /// Synthesize text in the voice of the reference clip.
    ///
    /// # Returns
    /// Raw WAV audio data
    fn synthesize(&self, request: &SynthesizeRequest) -> Result<Vec<u8>, BackendError>;
}

/// Create a backend from settings.
pub fn create_backend(settings: &BackendSettings) -> Result<HttpBackend, BackendError> {
    HttpBackend::from_settings(settings)
}

#[cfg(test)]
mod tests {
    use super::client::parse_sse_result;
    use super::*;
    use crate::cli::{BackendKind, Device};
    use crate::engine::Language;
    use std::path::PathBuf;

    // ===========================================
    // Backend trait tests with mocks
    // ===========================================

    #[test]
    fn test_mock_backend_health_success() {
        let mut mock = MockBackend::new();

        mock.expect_health().times(1).returning(|| {
            Ok(HealthResponse {
                status: "healthy".to_string(),
                model: "xtts_v1".to_string(),
                cuda_available: true,
                gpu: Some("NVIDIA A10G".to_string()),
                device: "cuda:0".to_string(),
            })
        });

        let health = mock.health().unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.cuda_available);
    }

    #[test]
    fn test_mock_backend_health_failure() {
        let mut mock = MockBackend::new();

        mock.expect_health().times(1).returning(|| {
            Err(BackendError::ConnectionFailed(
                "Connection refused".to_string(),
            ))
        });

        let result = mock.health();
        assert!(matches!(
            result.unwrap_err(),
            BackendError::ConnectionFailed(_)
        ));
    }

    #[test]
    fn test_mock_backend_load_model() {
        let mut mock = MockBackend::new();

        mock.expect_load_model()
            .withf(|req| req.model == "xtts_v1" && req.device == Device::Cpu)
            .times(1)
            .returning(|req| {
                Ok(HealthResponse {
                    status: "loaded".to_string(),
                    model: req.model.clone(),
                    cuda_available: false,
                    gpu: None,
                    device: "cpu".to_string(),
                })
            });

        let health = mock
            .load_model(&LoadRequest {
                model: "xtts_v1".to_string(),
                device: Device::Cpu,
            })
            .unwrap();
        assert_eq!(health.device, "cpu");
    }

    #[test]
    fn test_mock_backend_synthesize() {
        let mut mock = MockBackend::new();

        mock.expect_synthesize()
            .withf(|req| {
                req.text == "Hello world"
                    && req.language == Language::English
                    && req.speaker_wav == PathBuf::from("/tmp/female.wav")
            })
            .times(1)
            .returning(|_| Ok(b"RIFF\x00\x00\x00\x00WAVEfmt ".to_vec()));

        let request = SynthesizeRequest::new("Hello world", Language::English, "/tmp/female.wav");

        let audio = mock.synthesize(&request).unwrap();
        assert!(audio.starts_with(b"RIFF"));
    }

    // ===========================================
    // Construction tests
    // ===========================================

    #[test]
    fn test_create_backend_from_settings() {
        let settings = BackendSettings {
            url: "http://gpu-box:8020/".to_string(),
            kind: BackendKind::Gradio,
            ..BackendSettings::default()
        };

        let backend = create_backend(&settings).unwrap();
        assert_eq!(backend.base_url(), "http://gpu-box:8020");
        assert_eq!(backend.kind(), BackendKind::Gradio);
    }

    #[test]
    fn test_http_backend_new_trims_slash() {
        let backend = HttpBackend::new(BackendKind::Rest, "http://localhost:8020/");
        assert_eq!(backend.base_url(), "http://localhost:8020");
    }

    #[test]
    fn test_synthesize_missing_reference_file() {
        let backend = HttpBackend::new(BackendKind::Rest, "http://127.0.0.1:1");
        let request = SynthesizeRequest::new("Hello", Language::English, "/nonexistent/ref.wav");

        let result = backend.synthesize(&request);
        assert!(matches!(result, Err(BackendError::FileNotFound(_))));
    }

    // ===========================================
    // Wire protocol tests against a local server
    // ===========================================

    mod wire {
        use super::*;
        use axum::{
            Json, Router,
            extract::{Multipart, State},
            http::StatusCode,
            routing::{get, post},
        };
        use serde_json::{Value, json};
        use std::path::Path;
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::{Arc, Mutex};
        use tempfile::TempDir;

        const UPLOADED_PATH: &str = "/tmp/gradio/abc123/ref.wav";

        #[derive(Debug, Clone)]
        struct FormPart {
            name: String,
            file_name: Option<String>,
            content_type: Option<String>,
            data: Vec<u8>,
        }

        /// What the server saw, shared with the test.
        #[derive(Clone, Default)]
        struct Seen {
            base: String,
            parts: Arc<Mutex<Vec<FormPart>>>,
            json: Arc<Mutex<Vec<Value>>>,
            polls: Arc<AtomicU32>,
        }

        impl Seen {
            fn part(&self, name: &str) -> FormPart {
                self.parts
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|p| p.name == name)
                    .cloned()
                    .unwrap_or_else(|| panic!("no form part named {name}"))
            }
        }

        /// Serve `build(base_url)` on an ephemeral port from its own runtime.
        fn spawn_server(build: impl FnOnce(String) -> Router) -> String {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.set_nonblocking(true).unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let router = build(base.clone());

            std::thread::spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                    axum::serve(listener, router).await.unwrap();
                });
            });

            base
        }

        async fn record_parts(seen: &Seen, mut multipart: Multipart) {
            while let Some(field) = multipart.next_field().await.unwrap() {
                let part = FormPart {
                    name: field.name().unwrap_or_default().to_string(),
                    file_name: field.file_name().map(str::to_string),
                    content_type: field.content_type().map(str::to_string),
                    data: field.bytes().await.unwrap().to_vec(),
                };
                seen.parts.lock().unwrap().push(part);
            }
        }

        fn health_json(device: &str) -> Value {
            json!({
                "status": "healthy",
                "model": "xtts_v1",
                "cuda_available": device.starts_with("cuda"),
                "gpu": null,
                "device": device
            })
        }

        async fn tts_to_file(State(seen): State<Seen>, multipart: Multipart) -> Vec<u8> {
            record_parts(&seen, multipart).await;
            b"RIFF-synthesized".to_vec()
        }

        async fn tts_to_file_fails(multipart: Multipart) -> (StatusCode, &'static str) {
            record_parts(&Seen::default(), multipart).await;
            (StatusCode::INTERNAL_SERVER_ERROR, "speaker embedding failed")
        }

        async fn load(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
            seen.json.lock().unwrap().push(body);
            Json(health_json("cuda:0"))
        }

        async fn gradio_upload(State(seen): State<Seen>, multipart: Multipart) -> Json<Vec<String>> {
            record_parts(&seen, multipart).await;
            Json(vec![UPLOADED_PATH.to_string()])
        }

        async fn gradio_call(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
            seen.json.lock().unwrap().push(body);
            Json(json!({ "event_id": "ev-1" }))
        }

        /// Pending on the first poll, complete on the second.
        async fn gradio_poll(State(seen): State<Seen>) -> String {
            if seen.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                return "event: heartbeat\ndata: null\n\n".to_string();
            }
            format!(
                "event: complete\ndata: [{{\"path\": \"/tmp/gradio/out.wav\", \"url\": \"{}/gradio_api/file=out.wav\"}}]\n\n",
                seen.base
            )
        }

        async fn gradio_poll_pending(State(seen): State<Seen>) -> &'static str {
            seen.polls.fetch_add(1, Ordering::SeqCst);
            "event: heartbeat\ndata: null\n\n"
        }

        async fn gradio_file() -> Vec<u8> {
            b"RIFF-gradio".to_vec()
        }

        fn gradio_router(seen: Seen, poll_completes: bool) -> Router {
            let poll = if poll_completes {
                get(gradio_poll)
            } else {
                get(gradio_poll_pending)
            };

            Router::new()
                .route("/config", get(|| async { Json(json!({ "version": "4.0" })) }))
                .route("/gradio_api/upload", post(gradio_upload))
                .route("/gradio_api/call/predict", post(gradio_call))
                .route("/gradio_api/call/predict/ev-1", poll)
                .route("/gradio_api/file=out.wav", get(gradio_file))
                .with_state(seen)
        }

        fn gradio_backend(base: &str, max_poll_attempts: u32) -> HttpBackend {
            HttpBackend::from_settings(&BackendSettings {
                url: base.to_string(),
                kind: BackendKind::Gradio,
                poll_interval_ms: 1,
                max_poll_attempts,
                ..BackendSettings::default()
            })
            .unwrap()
        }

        fn reference_clip(dir: &Path, name: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, b"RIFF-reference").unwrap();
            path
        }

        // ===========================================
        // REST protocol
        // ===========================================

        #[test]
        fn test_rest_synthesize_posts_multipart() {
            let seen = Seen::default();
            let state = seen.clone();
            let base = spawn_server(move |_| {
                Router::new()
                    .route("/tts_to_file", post(tts_to_file))
                    .with_state(state)
            });
            let temp_dir = TempDir::new().unwrap();
            let speaker = reference_clip(temp_dir.path(), "male.wav");

            let backend = HttpBackend::new(BackendKind::Rest, &base);
            let audio = backend
                .synthesize(&SynthesizeRequest::new("Bonjour à tous", Language::French, speaker))
                .unwrap();

            assert_eq!(audio, b"RIFF-synthesized");
            assert_eq!(seen.part("text").data, "Bonjour à tous".as_bytes());
            assert_eq!(seen.part("language").data, b"fr");

            let clip = seen.part("speaker_wav");
            assert_eq!(clip.file_name.as_deref(), Some("male.wav"));
            assert_eq!(clip.content_type.as_deref(), Some("audio/wav"));
            assert_eq!(clip.data, b"RIFF-reference");
        }

        #[test]
        fn test_rest_synthesize_error_status_is_engine_error() {
            let base = spawn_server(|_| Router::new().route("/tts_to_file", post(tts_to_file_fails)));
            let temp_dir = TempDir::new().unwrap();
            let speaker = reference_clip(temp_dir.path(), "female.wav");

            let backend = HttpBackend::new(BackendKind::Rest, &base);
            let result =
                backend.synthesize(&SynthesizeRequest::new("Hello", Language::English, speaker));

            match result {
                Err(BackendError::Engine(detail)) => {
                    assert!(detail.contains("500"), "{detail}");
                    assert!(detail.contains("speaker embedding failed"), "{detail}");
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }

        #[test]
        fn test_rest_load_posts_model_and_device() {
            let seen = Seen::default();
            let state = seen.clone();
            let base = spawn_server(move |_| {
                Router::new()
                    .route("/health", get(|| async { Json(health_json("cpu")) }))
                    .route("/load", post(load))
                    .with_state(state)
            });

            let backend = HttpBackend::new(BackendKind::Rest, &base);
            assert_eq!(backend.health().unwrap().device, "cpu");

            let health = backend
                .load_model(&LoadRequest {
                    model: "tts_models/multilingual/multi-dataset/xtts_v1".to_string(),
                    device: Device::Cuda,
                })
                .unwrap();

            assert_eq!(health.device, "cuda:0");
            assert_eq!(
                seen.json.lock().unwrap().as_slice(),
                &[json!({
                    "model": "tts_models/multilingual/multi-dataset/xtts_v1",
                    "device": "cuda"
                })]
            );
        }

        #[test]
        fn test_rest_health_error_status() {
            let base = spawn_server(|_| {
                Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            });

            let result = HttpBackend::new(BackendKind::Rest, &base).health();

            assert!(matches!(result, Err(BackendError::RequestFailed(_))));
        }

        // ===========================================
        // Gradio protocol
        // ===========================================

        #[test]
        fn test_gradio_synthesize_uploads_calls_and_polls() {
            let seen = Seen::default();
            let state = seen.clone();
            let base = spawn_server(move |base| gradio_router(Seen { base, ..state }, true));
            let temp_dir = TempDir::new().unwrap();
            let speaker = reference_clip(temp_dir.path(), "ref.wav");

            let backend = gradio_backend(&base, 5);
            let audio = backend
                .synthesize(&SynthesizeRequest::new("Hola a todos", Language::Spanish, speaker))
                .unwrap();

            assert_eq!(audio, b"RIFF-gradio");

            let upload = seen.part("files");
            assert_eq!(upload.file_name.as_deref(), Some("ref.wav"));
            assert_eq!(upload.data, b"RIFF-reference");

            assert_eq!(
                seen.json.lock().unwrap().as_slice(),
                &[json!({
                    "data": [
                        "Hola a todos",
                        "es",
                        { "path": UPLOADED_PATH, "meta": { "_type": "gradio.FileData" } },
                        true
                    ]
                })]
            );
            assert_eq!(seen.polls.load(Ordering::SeqCst), 2);
        }

        #[test]
        fn test_gradio_poll_timeout() {
            let seen = Seen::default();
            let state = seen.clone();
            let base = spawn_server(move |_| gradio_router(state, false));
            let temp_dir = TempDir::new().unwrap();
            let speaker = reference_clip(temp_dir.path(), "ref.wav");

            let result = gradio_backend(&base, 3)
                .synthesize(&SynthesizeRequest::new("Hello", Language::English, speaker));

            assert!(matches!(result, Err(BackendError::Timeout(3))));
            assert_eq!(seen.polls.load(Ordering::SeqCst), 3);
        }

        #[test]
        fn test_gradio_health_and_load_use_config() {
            let base = spawn_server(|_| gradio_router(Seen::default(), true));
            let backend = gradio_backend(&base, 1);

            let health = backend
                .load_model(&LoadRequest {
                    model: "ignored".to_string(),
                    device: Device::Cpu,
                })
                .unwrap();

            assert_eq!(health.status, "healthy");
            assert_eq!(health.device, "remote");
        }
    }

    // ===========================================
    // Gradio SSE parsing tests
    // ===========================================

    #[test]
    fn test_parse_sse_pending() {
        let body = "event: heartbeat\ndata: null\n\n";
        assert_eq!(parse_sse_result(body).unwrap(), None);
    }

    #[test]
    fn test_parse_sse_complete_takes_last_url() {
        let body = concat!(
            "event: complete\n",
            "data: [{\"path\": \"/tmp/w.mp4\", \"url\": \"http://host/file=w.mp4\"}, ",
            "{\"path\": \"/tmp/o.wav\", \"url\": \"http://host/file=o.wav\"}]\n\n"
        );

        let url = parse_sse_result(body).unwrap();
        assert_eq!(url.as_deref(), Some("http://host/file=o.wav"));
    }

    #[test]
    fn test_parse_sse_complete_without_url() {
        let body = "event: complete\ndata: [null, null]\n\n";
        assert!(matches!(
            parse_sse_result(body),
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_sse_error_event() {
        let body = "event: error\ndata: \"CUDA out of memory\"\n\n";
        match parse_sse_result(body) {
            Err(BackendError::Engine(detail)) => assert!(detail.contains("CUDA out of memory")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
