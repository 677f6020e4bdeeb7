//! Sentence embeddings.
//!
//! This module provides:
//! - ONNX Runtime model loading and inference via the `ort` crate
//! - Model file lookup in a local directory or on the Hugging Face hub
//! - Dedicated thread pool for blocking inference
//! - The load-once embedding service and its request contract

mod encoder;
mod files;
mod model;
mod request;
mod service;
mod worker;

pub use encoder::{l2_normalize, Encoder, PlaceholderEncoder};
pub use files::{hub_repo_id, ModelFiles, MODEL_FILE, TOKENIZER_FILE};
pub use model::{load_tokenizer, EmbeddingModel, EMBEDDING_DIM, MAX_SEQ_LENGTH};
pub use request::{
    EmbeddingInput, EmbeddingRequest, EmbeddingResponse, HealthStatus, DEFAULT_BATCH_SIZE,
};
pub use service::EmbeddingService;
pub use worker::EmbeddingWorker;
