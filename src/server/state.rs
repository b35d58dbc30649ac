//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::backend::Backend;
use crate::config::Settings;
use crate::engine::TTSEngine;

/// State handed to every request handler.
pub struct AppState<B: Backend> {
    pub engine: Arc<TTSEngine<B>>,
    /// Queue for predictions; one permit per concurrently running job.
    pub jobs: Arc<Semaphore>,
    pub assets_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl<B: Backend> AppState<B> {
    pub fn new(engine: Arc<TTSEngine<B>>, settings: &Settings) -> Self {
        Self {
            engine,
            jobs: Arc::new(Semaphore::new(settings.server.max_concurrent_jobs)),
            assets_dir: settings.paths.assets_dir.clone(),
            max_upload_bytes: settings.server.max_upload_bytes,
        }
    }
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            jobs: Arc::clone(&self.jobs),
            assets_dir: self.assets_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}
