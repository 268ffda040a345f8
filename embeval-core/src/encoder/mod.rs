#[cfg(feature = "embeddings")]
mod fastembed;
#[cfg(feature = "openai-embeddings")]
mod openai;

#[cfg(feature = "embeddings")]
pub use fastembed::FastEmbedEncoder;
#[cfg(feature = "openai-embeddings")]
pub use openai::OpenAIEncoder;

use async_trait::async_trait;

use crate::config::EncoderConfig;
use crate::embeddings::Embeddings;
use crate::error::{Error, Result};

/// One sentence to encode, optionally paired with an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderInput {
    Text(String),
    Instructed { instruction: String, text: String },
}

impl EncoderInput {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Instructed { text, .. } => text,
        }
    }

    pub fn instruction(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Instructed { instruction, .. } => Some(instruction),
        }
    }

    /// Flatten into a single string (`instruction + text`) for backends
    /// without a separate instruction channel
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Instructed { instruction, text } => format!("{instruction}{text}"),
        }
    }
}

impl From<String> for EncoderInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for EncoderInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Wrap plain sentences as encoder inputs
pub fn plain_inputs(sentences: &[String]) -> Vec<EncoderInput> {
    sentences.iter().cloned().map(EncoderInput::Text).collect()
}

/// Trait for models that turn sentences into embeddings
#[async_trait]
pub trait SentenceEncoder: Send + Sync {
    /// Human-readable model name
    fn name(&self) -> &str;

    /// Encode `inputs` in chunks of `batch_size`, one row per input
    async fn encode(&self, inputs: &[EncoderInput], batch_size: usize) -> Result<Embeddings>;

    /// Embedding dimension
    fn dimension(&self) -> usize;
}

#[cfg(any(feature = "embeddings", feature = "openai-embeddings"))]
pub(crate) fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::Config("batch_size must be at least 1".into()));
    }
    Ok(())
}

/// Verify an encoder returned exactly one embedding per input
pub fn check_encoded(embeddings: &Embeddings, inputs: usize) -> Result<()> {
    if embeddings.len() != inputs {
        return Err(Error::Encoding(format!(
            "encoder returned {} embeddings for {} inputs",
            embeddings.len(),
            inputs
        )));
    }
    Ok(())
}

/// Unified encoder dispatching to the configured backend
pub enum Encoder {
    #[cfg(feature = "embeddings")]
    FastEmbed(FastEmbedEncoder),
    #[cfg(feature = "openai-embeddings")]
    OpenAI(OpenAIEncoder),
    #[cfg(not(any(feature = "embeddings", feature = "openai-embeddings")))]
    #[doc(hidden)]
    _Disabled(std::convert::Infallible),
}

impl Encoder {
    /// Create an encoder from configuration.
    ///
    /// Models namespaced with `openai/` (e.g. `openai/text-embedding-3-small`)
    /// dispatch to OpenAI; all others dispatch to fastembed.
    pub fn from_config(config: &EncoderConfig) -> Result<Self> {
        if let Some(model) = config.model.strip_prefix("openai/") {
            let mut config = config.clone();
            config.model = model.to_owned();
            Self::new_openai(&config)
        } else {
            Self::new_fastembed(config)
        }
    }

    #[cfg(feature = "openai-embeddings")]
    fn new_openai(config: &EncoderConfig) -> Result<Self> {
        Ok(Self::OpenAI(OpenAIEncoder::new(config)?))
    }

    #[cfg(not(feature = "openai-embeddings"))]
    fn new_openai(config: &EncoderConfig) -> Result<Self> {
        Err(Error::Config(format!(
            "Model '{}' requires the 'openai-embeddings' feature. \
             Rebuild with --features openai-embeddings",
            config.model
        )))
    }

    #[cfg(feature = "embeddings")]
    fn new_fastembed(config: &EncoderConfig) -> Result<Self> {
        Ok(Self::FastEmbed(FastEmbedEncoder::new(&config.model)?))
    }

    #[cfg(not(feature = "embeddings"))]
    fn new_fastembed(config: &EncoderConfig) -> Result<Self> {
        Err(Error::Config(format!(
            "Model '{}' requires the 'embeddings' feature. \
             Rebuild with --features embeddings",
            config.model
        )))
    }
}

#[async_trait]
impl SentenceEncoder for Encoder {
    fn name(&self) -> &str {
        match self {
            #[cfg(feature = "embeddings")]
            Self::FastEmbed(e) => e.name(),
            #[cfg(feature = "openai-embeddings")]
            Self::OpenAI(e) => e.name(),
            #[cfg(not(any(feature = "embeddings", feature = "openai-embeddings")))]
            Self::_Disabled(never) => match *never {},
        }
    }

    #[allow(unused_variables)]
    async fn encode(&self, inputs: &[EncoderInput], batch_size: usize) -> Result<Embeddings> {
        match self {
            #[cfg(feature = "embeddings")]
            Self::FastEmbed(e) => e.encode(inputs, batch_size).await,
            #[cfg(feature = "openai-embeddings")]
            Self::OpenAI(e) => e.encode(inputs, batch_size).await,
            #[cfg(not(any(feature = "embeddings", feature = "openai-embeddings")))]
            Self::_Disabled(never) => match *never {},
        }
    }

    fn dimension(&self) -> usize {
        match self {
            #[cfg(feature = "embeddings")]
            Self::FastEmbed(e) => e.dimension(),
            #[cfg(feature = "openai-embeddings")]
            Self::OpenAI(e) => e.dimension(),
            #[cfg(not(any(feature = "embeddings", feature = "openai-embeddings")))]
            Self::_Disabled(never) => match *never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_instructed() {
        let input = EncoderInput::Instructed {
            instruction: "Represent a domain:\n".into(),
            text: "set an alarm".into(),
        };
        assert_eq!(input.render(), "Represent a domain:\nset an alarm");
        assert_eq!(input.text(), "set an alarm");
        assert_eq!(input.instruction(), Some("Represent a domain:\n"));
    }

    #[test]
    fn test_plain_inputs() {
        let inputs = plain_inputs(&["a".to_string(), "b".to_string()]);
        assert_eq!(inputs, vec![EncoderInput::from("a"), EncoderInput::from("b")]);
        assert_eq!(inputs[0].instruction(), None);
    }

    #[cfg(any(feature = "embeddings", feature = "openai-embeddings"))]
    #[test]
    fn test_batch_size_zero_rejected() {
        assert!(check_batch_size(0).is_err());
        assert!(check_batch_size(1).is_ok());
    }

    #[cfg(not(feature = "openai-embeddings"))]
    #[test]
    fn test_openai_requires_feature() {
        let config = EncoderConfig {
            model: "openai/text-embedding-3-small".into(),
            ..Default::default()
        };
        let err = Encoder::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("openai-embeddings"));
    }
}
