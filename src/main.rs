//! xtts-demo server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};
use xtts_demo::backend::create_backend;
use xtts_demo::cli::Args;
use xtts_demo::config::{LoggingSettings, Settings, load_settings};
use xtts_demo::engine::TTSEngine;
use xtts_demo::reference::{DEFAULT_SPEAKER, ReferenceStore, examples};
use xtts_demo::server::{AppState, create_router, start_cleanup_task};
use xtts_demo::waveform::FfmpegWaveform;

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings =
        load_settings(args.config.as_deref()).context("Failed to load configuration")?;
    settings.apply_args(&args);
    settings.validate().context("Invalid configuration")?;

    init_tracing(&settings.logging);
    tracing::info!("Starting xtts-demo v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(file = ?args.config, "Settings loaded");

    // The backend uses a blocking HTTP client, so it is built and the model
    // loaded before the async runtime starts.
    let backend = create_backend(&settings.backend).context("Failed to create backend client")?;
    tracing::info!(
        url = %settings.backend.url,
        kind = settings.backend.kind.as_str(),
        "Using model server"
    );

    let references = ReferenceStore::new(
        settings.paths.uploads_dir.clone(),
        settings.paths.assets_dir.clone(),
    )
    .with_ffmpeg(settings.waveform.ffmpeg.clone());
    check_example_clips(&references);

    let mut engine = TTSEngine::new(backend, references, settings.paths.output_dir.clone())
        .with_model(settings.backend.model.clone(), settings.backend.device);

    if settings.waveform.enabled {
        engine = engine.with_waveform(Box::new(FfmpegWaveform::new(settings.waveform.clone())));
    } else {
        tracing::info!("Waveform video disabled; returning audio only");
    }

    let loaded = engine.load().context("Failed to load model")?;
    tracing::info!(model = %loaded.model, device = %loaded.device, "Model ready");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    // Held here so the blocking client is dropped outside the runtime
    let engine = Arc::new(engine);
    runtime.block_on(serve(Arc::clone(&engine), &settings))
}

async fn serve<B: xtts_demo::backend::Backend + 'static>(
    engine: Arc<TTSEngine<B>>,
    settings: &Settings,
) -> Result<()> {
    let app = create_router(AppState::new(engine, settings));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}", settings.server.host))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    let cleanup = if settings.paths.retention_secs > 0 {
        Some(start_cleanup_task(
            vec![
                settings.paths.output_dir.clone(),
                settings.paths.uploads_dir.clone(),
            ],
            Duration::from_secs(settings.paths.retention_secs),
            Duration::from_secs(settings.paths.cleanup_interval_secs),
        ))
    } else {
        tracing::info!("File retention disabled; uploads and outputs are kept");
        None
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(cleanup) = cleanup {
        let _ = cleanup.send(true);
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}

/// Warn about example rows whose speaker clip is missing or unreadable.
fn check_example_clips(references: &ReferenceStore) {
    let mut speakers: Vec<&str> = examples().iter().map(|e| e.speaker).collect();
    speakers.push(DEFAULT_SPEAKER);
    speakers.sort_unstable();
    speakers.dedup();

    for name in speakers {
        match references
            .resolve_asset(name)
            .and_then(|path| references.inspect(&path))
        {
            Ok(clip) => tracing::debug!(
                clip = name,
                duration_secs = clip.duration_secs,
                sample_rate = clip.sample_rate,
                "Example clip available"
            ),
            Err(e) => tracing::warn!(
                clip = name,
                assets = %references.assets_dir().display(),
                "Example clip unusable: {e}"
            ),
        }
    }
}

/// Initialize tracing; `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingSettings) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("xtts_demo={},tower_http=info", logging.level).into()
    });

    let fmt_layer = if logging.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
