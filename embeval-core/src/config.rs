use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration for embeval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Task being evaluated
    pub task: TaskConfig,
    /// Encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Evaluators to run, in order; the encoded test split is shared between them
    #[serde(default = "default_evaluators")]
    pub evaluators: Vec<EvaluatorConfig>,
    /// Extra instruction prompts, `model -> task -> instruction`
    #[serde(default)]
    pub prompts: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn from_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}

/// Task identification and split truncation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name, also used to look up instruction prompts
    pub name: String,
    /// Keep only the first `limit` train and test sentences
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Which classifier an evaluator fits on the embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluatorConfig {
    /// k-NN with a per-query neighbor search (cosine, euclidean)
    Knn {
        #[serde(default = "default_k")]
        k: usize,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
    },
    /// k-NN over full distance matrices (cosine, euclidean, dot)
    KnnMatrix {
        #[serde(default = "default_k")]
        k: usize,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
    },
    /// Logistic regression
    Logreg {
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_batch_size")]
        batch_size: usize,
        /// Model key for instruction prompts (e.g. `hku-nlp/instructor-large`)
        #[serde(default)]
        prompt: Option<String>,
    },
}

fn default_evaluators() -> Vec<EvaluatorConfig> {
    vec![EvaluatorConfig::Logreg {
        max_iter: default_max_iter(),
        batch_size: default_batch_size(),
        prompt: None,
    }]
}
fn default_k() -> usize {
    1
}
fn default_batch_size() -> usize {
    32
}
fn default_max_iter() -> usize {
    100
}

/// Encoder model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Model identifier (e.g. "BAAI/bge-small-en-v1.5" for fastembed,
    /// "openai/text-embedding-3-small" for OpenAI)
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for OpenAI (can also use OPENAI_API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Embedding dimensions (for OpenAI models; defaults to 1536)
    #[serde(default)]
    pub dimensions: Option<u32>,
}

fn default_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            dimensions: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
task:
  name: Banking77Classification
  limit: 500
encoder:
  model: openai/text-embedding-3-small
  dimensions: 256
evaluators:
  - type: knn
    k: 3
  - type: knn_matrix
  - type: logreg
    max_iter: 200
    prompt: hku-nlp/instructor-large
prompts:
  my-model:
    Banking77Classification: "Represent the banking query: "
"#;
        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.task.limit, Some(500));
        assert_eq!(config.encoder.dimensions, Some(256));
        assert_eq!(config.evaluators.len(), 3);
        assert!(matches!(
            config.evaluators[0],
            EvaluatorConfig::Knn { k: 3, batch_size: 32 }
        ));
        assert!(matches!(
            config.evaluators[1],
            EvaluatorConfig::KnnMatrix { k: 1, .. }
        ));
        match &config.evaluators[2] {
            EvaluatorConfig::Logreg {
                max_iter, prompt, ..
            } => {
                assert_eq!(*max_iter, 200);
                assert_eq!(prompt.as_deref(), Some("hku-nlp/instructor-large"));
            }
            other => panic!("unexpected evaluator {other:?}"),
        }
        assert_eq!(
            config.prompts["my-model"]["Banking77Classification"],
            "Represent the banking query: "
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_str("task:\n  name: ImdbClassification\n").unwrap();
        assert_eq!(config.encoder.model, "BAAI/bge-small-en-v1.5");
        assert!(config.task.limit.is_none());
        assert!(matches!(
            config.evaluators.as_slice(),
            [EvaluatorConfig::Logreg {
                max_iter: 100,
                batch_size: 32,
                prompt: None
            }]
        ));
    }
}
