//! Evaluators that fit a classifier on train embeddings and score it on the
//! test split.
//!
//! Every evaluator returns the encoded test split as a [`TestCache`] next to
//! its scores. The k-NN evaluators accept that cache back and skip encoding
//! the test sentences again.

mod knn;
mod knn_matrix;
mod logreg;

pub use knn::KnnEvaluator;
pub use knn_matrix::KnnMatrixEvaluator;
pub use logreg::LogRegEvaluator;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::embeddings::{Embeddings, TestCache};
use crate::encoder::{EncoderInput, SentenceEncoder, check_encoded, plain_inputs};
use crate::error::{Error, Result};
use crate::metrics::{accuracy, average_precision_from_predictions, f1_macro};
use crate::splits::ClassificationSplits;
use crate::types::{Label, Scores};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Trait for classification evaluators
#[async_trait]
pub trait ClassificationEvaluator: Send + Sync {
    /// Short name used in logs and results
    fn name(&self) -> &str;

    /// Whether the returned cache holds prompted test inputs, which other
    /// evaluators must not reuse
    fn prompts_test_inputs(&self) -> bool {
        false
    }

    /// Encode the splits with `encoder`, fit, and score on the test split
    async fn evaluate(
        &self,
        encoder: &dyn SentenceEncoder,
        test_cache: Option<TestCache>,
    ) -> Result<(Scores, TestCache)>;
}

async fn encode_checked(
    encoder: &dyn SentenceEncoder,
    inputs: &[EncoderInput],
    batch_size: usize,
) -> Result<Embeddings> {
    if inputs.is_empty() {
        return Err(Error::EmptyInput("no sentences to encode".into()));
    }
    let embeddings = encoder.encode(inputs, batch_size).await?;
    check_encoded(&embeddings, inputs.len())?;
    Ok(embeddings)
}

/// Encode the train split, and the test split unless a cache is supplied
async fn encode_splits(
    encoder: &dyn SentenceEncoder,
    splits: &ClassificationSplits,
    batch_size: usize,
    test_cache: Option<TestCache>,
) -> Result<(Embeddings, TestCache)> {
    if splits.test_len() == 0 {
        return Err(Error::EmptyInput("test split has no sentences".into()));
    }
    let train_inputs = plain_inputs(&splits.sentences_train);
    info!(count = train_inputs.len(), "Encoding training sentences");

    match test_cache {
        Some(cache) => {
            cache.check_len(splits.test_len())?;
            debug!(count = cache.len(), "Reusing cached test embeddings");
            let train = encode_checked(encoder, &train_inputs, batch_size).await?;
            Ok((train, cache))
        }
        None => {
            let test_inputs = plain_inputs(&splits.sentences_test);
            info!(count = test_inputs.len(), "Encoding test sentences");
            let (train, test) = futures::try_join!(
                encode_checked(encoder, &train_inputs, batch_size),
                encode_checked(encoder, &test_inputs, batch_size),
            )?;
            Ok((train, TestCache::new(test)))
        }
    }
}

/// Accuracy, macro F1, and (for two-class tasks) AP of one prediction set
#[derive(Debug, Clone, Copy)]
struct PredictionScores {
    accuracy: f64,
    f1: f64,
    ap: Option<f64>,
}

impl PredictionScores {
    fn compute(y_true: &[Label], y_pred: &[Label], pos_label: Option<Label>) -> Result<Self> {
        let ap = match pos_label {
            Some(pos) => Some(average_precision_from_predictions(y_true, y_pred, pos)?),
            None => None,
        };
        Ok(Self {
            accuracy: accuracy(y_true, y_pred)?,
            f1: f1_macro(y_true, y_pred)?,
            ap,
        })
    }
}

/// Record per-metric scores under `<name>_<metric>` keys and the best value
/// across metrics under the plain keys.
fn record_per_metric(scores: &mut Scores, results: &[(&str, PredictionScores)]) {
    let mut best_accuracy: f64 = 0.0;
    let mut best_f1: f64 = 0.0;
    let mut best_ap: Option<f64> = None;

    for (metric, s) in results {
        scores.insert(format!("accuracy_{metric}"), s.accuracy);
        scores.insert(format!("f1_{metric}"), s.f1);
        best_accuracy = best_accuracy.max(s.accuracy);
        best_f1 = best_f1.max(s.f1);
        if let Some(ap) = s.ap {
            scores.insert(format!("ap_{metric}"), ap);
            best_ap = Some(best_ap.map_or(ap, |b| b.max(ap)));
        }
    }

    scores.insert("accuracy", best_accuracy);
    scores.insert("f1", best_f1);
    if let Some(ap) = best_ap {
        scores.insert("ap", ap);
    }
}

fn resolve_batch_size(batch_size: usize) -> usize {
    if batch_size > 0 {
        batch_size
    } else {
        DEFAULT_BATCH_SIZE
    }
}
