use async_openai::Client as OpenAiClient;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use super::{EncoderInput, SentenceEncoder, check_batch_size, check_encoded};
use crate::config::EncoderConfig;
use crate::embeddings::Embeddings;
use crate::error::{Error, Result};

/// The embeddings endpoint rejects requests with more inputs than this
const MAX_REQUEST_INPUTS: usize = 2048;

/// OpenAI API-based encoder
pub struct OpenAIEncoder {
    model: String,
    dimensions: u32,
    client: OpenAiClient<OpenAIConfig>,
}

impl OpenAIEncoder {
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                Error::Config(
                    "OpenAI API key required. Set 'api_key' in encoder config \
                     or OPENAI_API_KEY env var"
                        .into(),
                )
            })?;

        let dimensions = config.dimensions.unwrap_or(1536);

        let oai_config = OpenAIConfig::new().with_api_key(&api_key);
        let client = OpenAiClient::with_config(oai_config);

        Ok(Self {
            model: config.model.clone(),
            dimensions,
            client,
        })
    }
}

#[async_trait]
impl SentenceEncoder for OpenAIEncoder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn encode(&self, inputs: &[EncoderInput], batch_size: usize) -> Result<Embeddings> {
        check_batch_size(batch_size)?;
        info!(
            "Encoding {} sentences with model={} dims={}",
            inputs.len(),
            self.model,
            self.dimensions,
        );

        let texts: Vec<String> = inputs.iter().map(EncoderInput::render).collect();
        let batch_size = batch_size.min(MAX_REQUEST_INPUTS);
        let total_batches = texts.len().div_ceil(batch_size);

        let pb = ProgressBar::new(total_batches as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                 {pos}/{len} batches ({msg})",
            )
            .map_err(|e| Error::Config(format!("Invalid progress template: {e}")))?
            .progress_chars("#>-"),
        );
        pb.set_message("encoding...");

        let mut rows = Vec::with_capacity(texts.len());
        for (batch_idx, batch) in texts.chunks(batch_size).enumerate() {
            debug!("Encoding batch of {} sentences", batch.len());

            let mut builder = CreateEmbeddingRequestArgs::default();
            builder
                .model(&self.model)
                .input(EmbeddingInput::StringArray(batch.to_vec()))
                .dimensions(self.dimensions);

            let request = builder
                .build()
                .map_err(|e| Error::Config(format!("Failed to build embedding request: {e}")))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| Error::Encoding(format!("OpenAI embedding request failed: {e}")))?;

            // the API may return items out of order; `index` is the input position
            let mut data = response.data;
            data.sort_by_key(|d| d.index);
            rows.extend(data.into_iter().map(|d| d.embedding));

            pb.set_message(format!("{} encoded", rows.len()));
            pb.set_position((batch_idx + 1) as u64);
        }

        pb.finish_with_message(format!("{} sentences encoded", rows.len()));

        let embeddings = Embeddings::from_rows(rows)?;
        check_encoded(&embeddings, inputs.len())?;
        info!("Encoded {} sentences successfully", embeddings.len());
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimensions as usize
    }
}
