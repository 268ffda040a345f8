use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    ClassificationEvaluator, DEFAULT_BATCH_SIZE, PredictionScores, encode_checked,
    resolve_batch_size,
};
use crate::embeddings::TestCache;
use crate::encoder::{EncoderInput, SentenceEncoder, plain_inputs};
use crate::error::Result;
use crate::logreg::{LogRegParams, LogisticRegression};
use crate::metrics::binary_pos_label;
use crate::prompts::{PromptRegistry, apply_prompt};
use crate::splits::ClassificationSplits;
use crate::types::Scores;

/// Logistic regression evaluator, optionally prepending an instruction
/// prompt to every sentence before encoding.
///
/// The test split is always re-encoded; a supplied cache is ignored because
/// the prompt changes what gets encoded.
pub struct LogRegEvaluator {
    splits: ClassificationSplits,
    max_iter: usize,
    batch_size: usize,
    instruction: Option<String>,
}

impl LogRegEvaluator {
    pub fn new(splits: ClassificationSplits, max_iter: usize) -> Self {
        Self {
            splits,
            max_iter,
            batch_size: DEFAULT_BATCH_SIZE,
            instruction: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = resolve_batch_size(batch_size);
        self
    }

    /// Prepend `instruction` to every train and test sentence
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Look up the instruction for `model` on `task`; fails if none is registered
    pub fn with_prompt(self, registry: &PromptRegistry, model: &str, task: &str) -> Result<Self> {
        let instruction = registry.lookup(model, task)?.to_string();
        Ok(self.with_instruction(instruction))
    }

    fn inputs(&self, sentences: &[String]) -> Vec<EncoderInput> {
        match &self.instruction {
            Some(instruction) => apply_prompt(sentences, instruction),
            None => plain_inputs(sentences),
        }
    }
}

#[async_trait]
impl ClassificationEvaluator for LogRegEvaluator {
    fn name(&self) -> &str {
        "logreg"
    }

    fn prompts_test_inputs(&self) -> bool {
        self.instruction.is_some()
    }

    async fn evaluate(
        &self,
        encoder: &dyn SentenceEncoder,
        test_cache: Option<TestCache>,
    ) -> Result<(Scores, TestCache)> {
        info!(
            max_iter = self.max_iter,
            prompted = self.instruction.is_some(),
            encoder = encoder.name(),
            "Running logistic regression evaluator"
        );
        if test_cache.is_some() {
            debug!("Ignoring supplied test cache; test sentences are re-encoded");
        }

        let train_inputs = self.inputs(&self.splits.sentences_train);
        info!(count = train_inputs.len(), "Encoding training sentences");
        let x_train = encode_checked(encoder, &train_inputs, self.batch_size).await?;

        let test_inputs = self.inputs(&self.splits.sentences_test);
        info!(count = test_inputs.len(), "Encoding test sentences");
        let test_cache = TestCache::new(encode_checked(encoder, &test_inputs, self.batch_size).await?);

        info!("Fitting logistic regression classifier");
        let mut clf = LogisticRegression::new(LogRegParams {
            max_iter: self.max_iter,
            ..Default::default()
        });
        clf.fit(&x_train.view(), &self.splits.y_train)?;

        info!("Evaluating");
        let y_pred = clf.predict(&test_cache.embeddings().view())?;

        let pos_label = binary_pos_label(&self.splits.y_train);
        let s = PredictionScores::compute(&self.splits.y_test, &y_pred, pos_label)?;

        let mut scores = Scores::new(self.name());
        scores.insert("accuracy", s.accuracy);
        scores.insert("f1", s.f1);
        if let Some(ap) = s.ap {
            scores.insert("ap", ap);
        }
        Ok((scores, test_cache))
    }
}
