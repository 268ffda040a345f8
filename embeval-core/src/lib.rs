pub mod config;
pub mod distance;
pub mod embeddings;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod knn;
pub mod logreg;
pub mod metrics;
pub mod prompts;
pub mod runner;
pub mod splits;
pub mod types;

// re-exports
pub use config::{Config, EncoderConfig, EvaluatorConfig};
pub use embeddings::{Embeddings, TestCache};
pub use encoder::{Encoder, EncoderInput, SentenceEncoder};
pub use error::{Error, Result};
pub use evaluator::{ClassificationEvaluator, KnnEvaluator, KnnMatrixEvaluator, LogRegEvaluator};
pub use knn::{DistanceMetric, KNeighborsClassifier};
pub use logreg::LogisticRegression;
pub use prompts::PromptRegistry;
pub use runner::EvaluationRunner;
pub use splits::{ClassificationSplits, SplitFile};
pub use types::{Label, Scores};
