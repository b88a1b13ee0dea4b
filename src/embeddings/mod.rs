// Embeddings module
// Embedding runtime abstraction, the persisted vector index and query expansion

pub mod expansion;
pub mod index;
pub mod ollama;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;

pub use expansion::QueryExpander;
pub use index::{DocumentEmbedding, EmbeddingIndex, VectorIndex};
pub use ollama::OllamaClient;

/// Black-box text -> vector function
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model; persisted indexes built by another model are discarded
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, one vector per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Cosine similarity, `0.0` when either vector has zero norm or the lengths differ
#[inline]
pub fn cosine_similarity(vec_a: &[f32], vec_b: &[f32]) -> f32 {
    if vec_a.len() != vec_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vec_a.iter().zip(vec_b.iter()).map(|(a, b)| a * b).sum();
    let norm_a: f32 = vec_a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = vec_b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
