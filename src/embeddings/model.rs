//! ONNX sentence-embedding model.
//!
//! A model is an ONNX export plus `tokenizer.json`, as published for
//! sentence-transformers checkpoints. See [`ModelFiles`] for where they
//! are looked up.

use std::path::Path;

use ndarray::{Array2, ArrayViewD, Axis, Ix2, Ix3};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use super::encoder::{l2_normalize, Encoder};
use super::files::ModelFiles;
use crate::error::EmbeddingError;
use crate::Result;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length; longer texts are truncated.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Segment ids input; BERT exports declare it, many others do not.
const TOKEN_TYPE_IDS: &str = "token_type_ids";

/// ONNX embedding model wrapper.
pub struct EmbeddingModel {
    name: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    token_type_ids: bool,
    files: ModelFiles,
}

impl EmbeddingModel {
    /// Load the model called `name` from `models_dir`, downloading it from
    /// the hub when there is no local directory for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the model files are missing or cannot be loaded.
    pub fn load_by_name(models_dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let files = ModelFiles::resolve(models_dir, name)?;
        Self::load_files(name, files)
    }

    /// Load a model from an explicit directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the model files are missing or cannot be loaded.
    pub fn load(name: impl Into<String>, model_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_files(name, ModelFiles::in_dir(model_dir))
    }

    /// Load a model from resolved file paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the model files are missing or cannot be loaded.
    pub fn load_files(name: impl Into<String>, files: ModelFiles) -> Result<Self> {
        let name = name.into();
        files.check_exist()?;

        tracing::info!(model = %name, path = %files.model.display(), "Loading ONNX embedding model");

        let tokenizer = load_tokenizer(&files.tokenizer)?;

        let mut session = Session::builder()
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to set threads: {e}")))?
            .commit_from_file(&files.model)
            .map_err(|e| EmbeddingError::ModelLoad(format!("failed to load model: {e}")))?;

        let token_type_ids = declares_input(
            session.inputs().iter().map(|input| input.name()),
            TOKEN_TYPE_IDS,
        );
        tracing::debug!(
            inputs = session.inputs().len(),
            outputs = session.outputs().len(),
            token_type_ids,
            "ONNX session ready"
        );

        // One warm-up pass so the output dimension is known before serving.
        let sample = run_batch(
            &mut session,
            &tokenizer,
            &["dimension check".to_string()],
            token_type_ids,
        )?;
        let dimension = sample.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(EmbeddingError::ModelLoad("model produced an empty vector".to_string()).into());
        }

        tracing::info!(model = %name, dimension, "Model loaded successfully");

        Ok(Self {
            name,
            session: Mutex::new(session),
            tokenizer,
            dimension,
            token_type_ids,
            files,
        })
    }

    /// Model identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Files the model was loaded from.
    #[must_use]
    pub const fn files(&self) -> &ModelFiles {
        &self.files
    }
}

impl Encoder for EmbeddingModel {
    fn encode(
        &self,
        texts: &[String],
        normalize: bool,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            let mut session = self.session.lock();
            let vectors = run_batch(&mut session, &self.tokenizer, chunk, self.token_type_ids)?;
            drop(session);
            out.extend(vectors);
        }

        for (i, vector) in out.iter_mut().enumerate() {
            if vector.len() != self.dimension {
                return Err(EmbeddingError::Runtime(format!(
                    "unexpected embedding dimension at index {i}: {} (expected {})",
                    vector.len(),
                    self.dimension
                ))
                .into());
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(EmbeddingError::Runtime(format!(
                    "non-finite value in embedding at index {i}"
                ))
                .into());
            }
            if normalize {
                l2_normalize(vector);
            }
        }

        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl std::fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("name", &self.name)
            .field("model", &self.files.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Load a tokenizer configured to pad each batch to its longest text and
/// truncate at [`MAX_SEQ_LENGTH`].
///
/// # Errors
///
/// Returns an error if the tokenizer cannot be loaded.
pub fn load_tokenizer(path: impl AsRef<Path>) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path.as_ref())
        .map_err(|e| EmbeddingError::Tokenization(format!("failed to load tokenizer: {e}")))?;

    tokenizer.with_padding(Some(PaddingParams::default()));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQ_LENGTH,
            ..TruncationParams::default()
        }))
        .map_err(|e| EmbeddingError::Tokenization(format!("failed to set truncation: {e}")))?;

    Ok(tokenizer)
}

/// Whether a graph with inputs `declared` takes an input called `name`.
fn declares_input<'a>(declared: impl IntoIterator<Item = &'a str>, name: &str) -> bool {
    declared.into_iter().any(|input| input == name)
}

/// Tokenize one batch, run inference and pool to one vector per text.
///
/// `token_type_ids` is fed only when `with_token_types` is set.
fn run_batch(
    session: &mut Session,
    tokenizer: &Tokenizer,
    texts: &[String],
    with_token_types: bool,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| EmbeddingError::Tokenization(format!("failed to tokenize: {e}")))?;

    let batch_size = encodings.len();
    let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

    let mut input_ids = Array2::<i64>::zeros((batch_size, seq_len));
    let mut attention_mask = Array2::<i64>::zeros((batch_size, seq_len));
    let mut token_type_ids = Array2::<i64>::zeros((batch_size, seq_len));

    for (i, encoding) in encodings.iter().enumerate() {
        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        let types = encoding.get_type_ids();
        for j in 0..ids.len().min(seq_len) {
            input_ids[[i, j]] = i64::from(ids[j]);
            attention_mask[[i, j]] = i64::from(mask[j]);
            token_type_ids[[i, j]] = i64::from(types[j]);
        }
    }

    let mask_for_pooling = attention_mask.clone();

    let input_ids = Value::from_array(input_ids)
        .map_err(|e| EmbeddingError::Runtime(format!("failed to create input_ids: {e}")))?;
    let attention_mask = Value::from_array(attention_mask)
        .map_err(|e| EmbeddingError::Runtime(format!("failed to create attention_mask: {e}")))?;

    let outputs = if with_token_types {
        let token_type_ids = Value::from_array(token_type_ids)
            .map_err(|e| EmbeddingError::Runtime(format!("failed to create token_type_ids: {e}")))?;
        session.run(ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            TOKEN_TYPE_IDS => token_type_ids
        ])
    } else {
        session.run(ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask
        ])
    }
    .map_err(|e| EmbeddingError::Runtime(format!("inference failed: {e}")))?;

    // Output names differ between exports; the first output is the hidden state.
    let hidden = outputs[0]
        .try_extract_array::<f32>()
        .map_err(|e| EmbeddingError::Runtime(format!("failed to extract output: {e}")))?;

    pool_output(&hidden, &mask_for_pooling)
}

/// Reduce a model output to sentence vectors.
///
/// `[batch, seq, hidden]` outputs are mean-pooled over the attention mask;
/// `[batch, hidden]` outputs are already pooled and returned as-is.
fn pool_output(hidden: &ArrayViewD<'_, f32>, attention_mask: &Array2<i64>) -> Result<Vec<Vec<f32>>> {
    match hidden.ndim() {
        3 => {
            let hidden = hidden
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|e| EmbeddingError::Runtime(format!("bad output shape: {e}")))?;
            Ok(hidden
                .axis_iter(Axis(0))
                .zip(attention_mask.axis_iter(Axis(0)))
                .map(|(tokens, mask)| {
                    let mask: Vec<i64> = mask.to_vec();
                    let flat: Vec<f32> = tokens.iter().copied().collect();
                    mean_pool(&flat, &mask, tokens.shape()[0], tokens.shape()[1])
                })
                .collect())
        }
        2 => {
            let pooled = hidden
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|e| EmbeddingError::Runtime(format!("bad output shape: {e}")))?;
            Ok(pooled.axis_iter(Axis(0)).map(|row| row.to_vec()).collect())
        }
        n => Err(EmbeddingError::Runtime(format!(
            "unsupported output rank {n}, expected 2 or 3"
        ))
        .into()),
    }
}

/// Mean of the token vectors whose attention mask is set.
#[allow(clippy::cast_precision_loss)]
fn mean_pool(hidden_states: &[f32], attention_mask: &[i64], seq_len: usize, hidden_size: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for (i, &mask) in attention_mask.iter().take(seq_len).enumerate() {
        if mask == 1 {
            for (j, s) in sum.iter_mut().enumerate() {
                *s += hidden_states[i * hidden_size + j];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for s in &mut sum {
            *s /= count;
        }
    }

    sum
}
