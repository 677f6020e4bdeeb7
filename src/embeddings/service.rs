//! High-level embedding service.
//!
//! Owns the write-once model handle and the request contract around it:
//! readiness, input coercion, delegation to the worker pool and response
//! shaping.

use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;

use super::encoder::Encoder;
use super::model::EmbeddingModel;
use super::request::{EmbeddingRequest, EmbeddingResponse, HealthStatus};
use super::worker::EmbeddingWorker;
use crate::error::EmbeddingError;
use crate::{Error, Result};

/// High-level embedding service.
///
/// Starts in the loading state and becomes ready exactly once, when a model
/// is installed. Cheap to clone.
#[derive(Clone)]
pub struct EmbeddingService {
    inner: Arc<EmbeddingServiceInner>,
}

struct EmbeddingServiceInner {
    model_name: String,
    num_workers: usize,
    worker: OnceCell<EmbeddingWorker>,
}

impl EmbeddingService {
    /// Create a service that will serve `model_name` once loaded.
    #[must_use]
    pub fn new(model_name: impl Into<String>, num_workers: usize) -> Self {
        Self {
            inner: Arc::new(EmbeddingServiceInner {
                model_name: model_name.into(),
                num_workers,
                worker: OnceCell::new(),
            }),
        }
    }

    /// Name of the configured model.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.inner.model_name
    }

    /// Whether the model has finished loading.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.worker.get().is_some()
    }

    /// Readiness report. Never fails.
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            model_loaded: self.is_ready(),
            model: self.inner.model_name.clone(),
        }
    }

    /// Publish a loaded encoder and start its worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a model is already installed or the pool cannot start.
    pub fn install(&self, encoder: Arc<dyn Encoder>) -> Result<()> {
        if self.is_ready() {
            return Err(Error::internal("model already loaded"));
        }

        let dimension = encoder.dimension();
        let worker = EmbeddingWorker::new(encoder, self.inner.num_workers)?;
        self.inner
            .worker
            .set(worker)
            .map_err(|_| Error::internal("model already loaded"))?;

        tracing::info!(model = %self.inner.model_name, dimension, "Embedding service ready");
        Ok(())
    }

    /// Run `load` on the blocking pool and install its result.
    ///
    /// Returns immediately; the service reports not-ready until the
    /// returned task completes successfully.
    pub fn spawn_load<F>(&self, load: F) -> JoinHandle<Result<()>>
    where
        F: FnOnce() -> Result<Arc<dyn Encoder>> + Send + 'static,
    {
        tokio::spawn(load_and_install(self.clone(), load))
    }

    /// Load the configured model in the background, from `models_dir` or,
    /// when it has no directory for the model, from the hub.
    pub fn spawn_load_model(&self, models_dir: PathBuf) -> JoinHandle<Result<()>> {
        let name = self.inner.model_name.clone();
        self.spawn_load(move || {
            let model = EmbeddingModel::load_by_name(&models_dir, &name)?;
            Ok(Arc::new(model) as Arc<dyn Encoder>)
        })
    }

    /// Compute embeddings for a request.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] before the model is loaded.
    /// - [`Error::BadRequest`] when `input` is absent or null.
    /// - Any encoder failure, unchanged.
    pub async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let worker = self.inner.worker.get().ok_or(Error::NotReady)?;

        let normalize = request.normalize();
        let batch_size = request.batch_size();
        let texts = request
            .input
            .ok_or_else(|| Error::bad_request("Missing input"))?
            .into_texts();
        let input_count = texts.len();

        tracing::debug!(input_count, normalize, batch_size, "Generating embeddings");

        if texts.is_empty() {
            return Ok(EmbeddingResponse {
                embedding: Vec::new(),
                input_count,
            });
        }

        let embedding = worker.encode(texts, normalize, batch_size).await?;

        if embedding.len() != input_count {
            return Err(EmbeddingError::Runtime(format!(
                "model returned {} vectors for {input_count} texts",
                embedding.len()
            ))
            .into());
        }

        Ok(EmbeddingResponse {
            embedding,
            input_count,
        })
    }
}

async fn load_and_install<F>(service: EmbeddingService, load: F) -> Result<()>
where
    F: FnOnce() -> Result<Arc<dyn Encoder>> + Send + 'static,
{
    tracing::info!(model = %service.model_name(), "Loading embedding model (this may take a while)");

    let encoder = tokio::task::spawn_blocking(load)
        .await
        .map_err(|e| EmbeddingError::ModelLoad(format!("load task failed: {e}")))??;

    service.install(encoder)
}

impl std::fmt::Debug for EmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingService")
            .field("model_name", &self.inner.model_name)
            .field("ready", &self.is_ready())
            .field("num_workers", &self.inner.num_workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingInput, PlaceholderEncoder};
    use serde_json::json;

    fn ready_service() -> EmbeddingService {
        let service = EmbeddingService::new("test-model", 1);
        service
            .install(Arc::new(PlaceholderEncoder::new(8)))
            .unwrap();
        service
    }

    fn request(body: serde_json::Value) -> EmbeddingRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_new_service_not_ready() {
        let service = EmbeddingService::new("test-model", 1);
        assert!(!service.is_ready());

        let health = service.health();
        assert_eq!(health.status, "ok");
        assert!(!health.model_loaded);
        assert_eq!(health.model, "test-model");
    }

    #[tokio::test]
    async fn test_embed_before_load() {
        let service = EmbeddingService::new("test-model", 1);
        let err = service
            .embed(EmbeddingRequest::new(EmbeddingInput::Text("hi".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady));
    }

    #[tokio::test]
    async fn test_not_ready_takes_precedence_over_missing_input() {
        let service = EmbeddingService::new("test-model", 1);
        let err = service.embed(EmbeddingRequest::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotReady));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let err = ready_service()
            .embed(EmbeddingRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(err.to_string(), "Missing input");
    }

    #[tokio::test]
    async fn test_single_text() {
        let response = ready_service()
            .embed(request(json!({"input": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.input_count, 1);
        assert_eq!(response.embedding.len(), 1);
        assert_eq!(response.embedding[0].len(), 8);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let encoder = PlaceholderEncoder::new(8);
        let response = ready_service()
            .embed(request(json!({"input": ["a", "b", 3], "batch_size": 2})))
            .await
            .unwrap();

        assert_eq!(response.input_count, 3);
        assert_eq!(response.embedding[0], encoder.embed_text("a"));
        assert_eq!(response.embedding[1], encoder.embed_text("b"));
        assert_eq!(response.embedding[2], encoder.embed_text("3"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let response = ready_service()
            .embed(request(json!({"input": []})))
            .await
            .unwrap();
        assert_eq!(response.input_count, 0);
        assert!(response.embedding.is_empty());
    }

    #[test]
    fn test_install_twice_fails() {
        let service = ready_service();
        let err = service
            .install(Arc::new(PlaceholderEncoder::new(8)))
            .unwrap_err();
        assert!(err.to_string().contains("already loaded"));
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn test_spawn_load_transitions_to_ready() {
        let service = EmbeddingService::new("test-model", 1);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let handle = service.spawn_load(move || {
            release_rx.recv().ok();
            Ok(Arc::new(PlaceholderEncoder::new(8)) as Arc<dyn Encoder>)
        });

        assert!(!service.is_ready());
        release_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert!(service.is_ready());
        assert!(service.health().model_loaded);
    }

    #[tokio::test]
    async fn test_spawn_load_failure_stays_not_ready() {
        let service = EmbeddingService::new("incomplete", 1);
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("incomplete");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.onnx"), b"not really onnx").unwrap();

        let result = service
            .spawn_load_model(tmp.path().to_path_buf())
            .await
            .unwrap();

        assert!(result.unwrap_err().to_string().contains("tokenizer.json"));
        assert!(!service.is_ready());
    }
}
