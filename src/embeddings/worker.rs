//! Embedding worker thread pool.
//!
//! Runs blocking model inference on dedicated threads so the async runtime
//! keeps accepting requests and answering health checks.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::encoder::Encoder;
use crate::error::EmbeddingError;
use crate::Result;

/// A unit of work for the pool.
struct EncodeJob {
    texts: Vec<String>,
    normalize: bool,
    batch_size: usize,
    response_tx: tokio::sync::oneshot::Sender<Result<Vec<Vec<f32>>>>,
}

/// Worker pool for embedding generation.
pub struct EmbeddingWorker {
    request_tx: Sender<EncodeJob>,
    encoder: Arc<dyn Encoder>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl EmbeddingWorker {
    /// Start `num_workers` threads sharing `encoder`.
    ///
    /// The job queue is unbounded: callers are never made to wait for a
    /// free slot.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(encoder: Arc<dyn Encoder>, num_workers: usize) -> Result<Self> {
        let (request_tx, request_rx): (Sender<EncodeJob>, Receiver<EncodeJob>) = unbounded();

        let mut workers = Vec::with_capacity(num_workers);

        for i in 0..num_workers.max(1) {
            let encoder = Arc::clone(&encoder);
            let rx = request_rx.clone();

            let handle = std::thread::Builder::new()
                .name(format!("embedding-worker-{i}"))
                .spawn(move || worker_loop(encoder.as_ref(), &rx))
                .map_err(|e| EmbeddingError::WorkerPool(format!("failed to spawn worker: {e}")))?;

            workers.push(handle);
        }

        tracing::info!(num_workers = workers.len(), "Embedding worker pool started");

        Ok(Self {
            request_tx,
            encoder,
            workers,
        })
    }

    /// Encode texts on a worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is gone or the encoder fails.
    pub async fn encode(
        &self,
        texts: Vec<String>,
        normalize: bool,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let (response_tx, response_rx) = tokio::sync::oneshot::channel();

        let job = EncodeJob {
            texts,
            normalize,
            batch_size,
            response_tx,
        };

        self.request_tx
            .send(job)
            .map_err(|_| EmbeddingError::WorkerPool("worker pool closed".to_string()))?;

        response_rx
            .await
            .map_err(|_| EmbeddingError::WorkerPool("worker dropped response".to_string()))?
    }

    /// Vector length produced by the underlying encoder.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.encoder.dimension()
    }
}

impl std::fmt::Debug for EmbeddingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingWorker")
            .field("workers", &self.workers.len())
            .field("dimension", &self.dimension())
            .finish()
    }
}

/// Pull jobs until the sending side is dropped.
fn worker_loop(encoder: &dyn Encoder, request_rx: &Receiver<EncodeJob>) {
    while let Ok(job) = request_rx.recv() {
        let result = encoder.encode(&job.texts, job.normalize, job.batch_size);
        if let Err(e) = &result {
            tracing::warn!(error = %e, texts = job.texts.len(), "Encoding failed");
        }

        // Receiver may have gone away with its request.
        let _ = job.response_tx.send(result);
    }

    tracing::debug!("Embedding worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::PlaceholderEncoder;

    struct FailingEncoder;

    impl Encoder for FailingEncoder {
        fn encode(&self, _: &[String], _: bool, _: usize) -> Result<Vec<Vec<f32>>> {
            Err(EmbeddingError::Runtime("out of memory".to_string()).into())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_worker_encodes_in_order() {
        let encoder = PlaceholderEncoder::new(8);
        let worker = EmbeddingWorker::new(Arc::new(encoder), 2).unwrap();
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        let result = tokio_test::block_on(worker.encode(texts.clone(), false, 2)).unwrap();

        assert_eq!(result.len(), 3);
        for (text, vector) in texts.iter().zip(&result) {
            assert_eq!(vector, &encoder.embed_text(text));
        }
        assert_eq!(worker.dimension(), 8);
    }

    #[test]
    fn test_worker_propagates_errors() {
        let worker = EmbeddingWorker::new(Arc::new(FailingEncoder), 1).unwrap();
        let err = tokio_test::block_on(worker.encode(vec!["x".to_string()], false, 32)).unwrap_err();
        assert!(err.to_string().contains("out of memory"));
    }

    /// Blocks every call until two are in flight at once.
    struct Rendezvous(std::sync::Barrier);

    impl Encoder for Rendezvous {
        fn encode(&self, texts: &[String], _: bool, _: usize) -> Result<Vec<Vec<f32>>> {
            self.0.wait();
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_workers_run_jobs_in_parallel() {
        let encoder = Arc::new(Rendezvous(std::sync::Barrier::new(2)));
        let worker = EmbeddingWorker::new(encoder, 2).unwrap();

        let (first, second) = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            tokio::join!(
                worker.encode(vec!["a".to_string()], false, 1),
                worker.encode(vec!["b".to_string()], false, 1)
            )
        })
        .await
        .expect("jobs should run on separate threads");

        assert_eq!(first.unwrap(), vec![vec![1.0]]);
        assert_eq!(second.unwrap(), vec![vec![1.0]]);
    }

    #[tokio::test]
    async fn test_worker_concurrent_jobs() {
        let worker = Arc::new(EmbeddingWorker::new(Arc::new(PlaceholderEncoder::new(4)), 2).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move { worker.encode(vec![format!("text {i}")], true, 32).await })
            })
            .collect();

        for handle in handles {
            let vectors = handle.await.unwrap().unwrap();
            assert_eq!(vectors.len(), 1);
            assert_eq!(vectors[0].len(), 4);
        }
    }
}
