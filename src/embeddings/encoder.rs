//! The encoder seam between the service and the model that computes vectors.

use crate::Result;

use super::model::EMBEDDING_DIM;

/// Something that turns texts into fixed-dimension vectors.
///
/// Implementations are synchronous and may block; the service always
/// calls them from a worker thread.
pub trait Encoder: Send + Sync {
    /// Encode `texts`, returning one vector per text in the same order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying model fails.
    fn encode(&self, texts: &[String], normalize: bool, batch_size: usize)
        -> Result<Vec<Vec<f32>>>;

    /// Length of every vector this encoder produces.
    fn dimension(&self) -> usize;
}

/// Scale `vector` to unit Euclidean length. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector {
            *v /= norm;
        }
    }
}

/// Deterministic hash-based encoder.
///
/// Produces stable pseudo-random vectors without a model on disk. Used in
/// tests and benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderEncoder {
    dimension: usize,
}

impl PlaceholderEncoder {
    /// Create an encoder producing vectors of `dimension` components.
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Raw (un-normalized) vector for a single text.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let value = (((seed >> 33) as f32) / (u32::MAX as f32)).mul_add(2.0, -1.0);
            embedding.push(value);
        }
        embedding
    }
}

impl Default for PlaceholderEncoder {
    fn default() -> Self {
        Self::new(EMBEDDING_DIM)
    }
}

impl Encoder for PlaceholderEncoder {
    fn encode(
        &self,
        texts: &[String],
        normalize: bool,
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            for text in chunk {
                let mut vector = self.embed_text(text);
                if normalize {
                    l2_normalize(&mut vector);
                }
                out.push(vector);
            }
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
