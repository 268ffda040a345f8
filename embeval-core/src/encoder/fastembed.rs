use std::sync::Arc;

use ::fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use async_trait::async_trait;
use tracing::debug;

use super::{EncoderInput, SentenceEncoder, check_batch_size, check_encoded};
use crate::embeddings::Embeddings;
use crate::error::{Error, Result};

/// Fastembed-based local encoder
pub struct FastEmbedEncoder {
    name: String,
    model: Arc<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedEncoder {
    pub fn new(model_name: &str) -> Result<Self> {
        let model = parse_model(model_name)?;
        let embedding =
            TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(true))
                .map_err(|e| Error::Config(format!("Failed to load embedding model: {}", e)))?;

        // fastembed doesn't expose the dimension directly, so probe once
        let dimension = embedding
            .embed(vec!["test"], None)
            .map_err(|e| Error::Encoding(format!("Embedding failed: {}", e)))?
            .first()
            .map(|e| e.len())
            .unwrap_or(0);

        Ok(Self {
            name: model_name.to_string(),
            model: Arc::new(embedding),
            dimension,
        })
    }
}

#[async_trait]
impl SentenceEncoder for FastEmbedEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn encode(&self, inputs: &[EncoderInput], batch_size: usize) -> Result<Embeddings> {
        check_batch_size(batch_size)?;
        let texts: Vec<String> = inputs.iter().map(EncoderInput::render).collect();
        debug!(count = texts.len(), batch_size, model = %self.name, "Encoding with fastembed");

        // inference is CPU-bound; keep it off the async workers
        let model = Arc::clone(&self.model);
        let vectors = tokio::task::spawn_blocking(move || model.embed(texts, Some(batch_size)))
            .await
            .map_err(|e| Error::Encoding(format!("Encoding task panicked: {}", e)))?
            .map_err(|e| Error::Encoding(format!("Embedding failed: {}", e)))?;

        let embeddings = Embeddings::from_rows(vectors)?;
        check_encoded(&embeddings, inputs.len())?;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn parse_model(name: &str) -> Result<EmbeddingModel> {
    match name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "BAAI/bge-large-en-v1.5" | "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "sentence-transformers/all-MiniLM-L12-v2" | "all-MiniLM-L12-v2" => {
            Ok(EmbeddingModel::AllMiniLML12V2)
        }
        "intfloat/multilingual-e5-small" | "multilingual-e5-small" => {
            Ok(EmbeddingModel::MultilingualE5Small)
        }
        _ => Err(Error::Config(format!(
            "Unknown embedding model: {}. Supported: bge-small-en-v1.5, bge-base-en-v1.5, \
             bge-large-en-v1.5, all-MiniLM-L6-v2, all-MiniLM-L12-v2, multilingual-e5-small",
            name
        ))),
    }
}
