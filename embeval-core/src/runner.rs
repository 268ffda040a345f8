use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{Config, EvaluatorConfig};
use crate::embeddings::TestCache;
use crate::encoder::SentenceEncoder;
use crate::error::{Error, Result};
use crate::evaluator::{
    ClassificationEvaluator, KnnEvaluator, KnnMatrixEvaluator, LogRegEvaluator,
};
use crate::prompts::PromptRegistry;
use crate::splits::ClassificationSplits;
use crate::types::Scores;

/// Build the evaluators named in `config` for one task's splits
pub fn build_evaluators(
    config: &Config,
    splits: &ClassificationSplits,
    registry: &PromptRegistry,
) -> Result<Vec<Box<dyn ClassificationEvaluator>>> {
    config
        .evaluators
        .iter()
        .map(|evaluator| -> Result<Box<dyn ClassificationEvaluator>> {
            match evaluator {
                EvaluatorConfig::Knn { k, batch_size } => Ok(Box::new(
                    KnnEvaluator::new(splits.clone(), *k).with_batch_size(*batch_size),
                )),
                EvaluatorConfig::KnnMatrix { k, batch_size } => Ok(Box::new(
                    KnnMatrixEvaluator::new(splits.clone(), *k).with_batch_size(*batch_size),
                )),
                EvaluatorConfig::Logreg {
                    max_iter,
                    batch_size,
                    prompt,
                } => {
                    let mut evaluator =
                        LogRegEvaluator::new(splits.clone(), *max_iter).with_batch_size(*batch_size);
                    if let Some(model) = prompt {
                        evaluator = evaluator.with_prompt(registry, model, &config.task.name)?;
                    }
                    Ok(Box::new(evaluator))
                }
            }
        })
        .collect()
}

/// Runs a task's evaluators in order against one encoder, handing the
/// encoded test split from each evaluator to the next
pub struct EvaluationRunner {
    task: String,
    encoder: Box<dyn SentenceEncoder>,
    evaluators: Vec<Box<dyn ClassificationEvaluator>>,
    test_cache: Option<TestCache>,
}

impl EvaluationRunner {
    pub fn new(task: impl Into<String>, encoder: Box<dyn SentenceEncoder>) -> Self {
        Self {
            task: task.into(),
            encoder,
            evaluators: Vec::new(),
            test_cache: None,
        }
    }

    /// Build the runner and its evaluators from configuration
    pub fn from_config(
        config: &Config,
        splits: ClassificationSplits,
        encoder: Box<dyn SentenceEncoder>,
    ) -> Result<Self> {
        let mut registry = PromptRegistry::builtin();
        registry.extend(&config.prompts);

        let splits = splits.with_limit(config.task.limit);
        let evaluators = build_evaluators(config, &splits, &registry)?;
        Ok(Self::new(config.task.name.clone(), encoder).with_evaluators(evaluators))
    }

    pub fn with_evaluators(mut self, evaluators: Vec<Box<dyn ClassificationEvaluator>>) -> Self {
        self.evaluators = evaluators;
        self
    }

    /// Seed the runner with test embeddings computed elsewhere
    pub fn with_test_cache(mut self, cache: TestCache) -> Self {
        self.test_cache = Some(cache);
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    pub fn evaluator_count(&self) -> usize {
        self.evaluators.len()
    }

    /// The most recent plain (unprompted) test cache
    pub fn test_cache(&self) -> Option<&TestCache> {
        self.test_cache.as_ref()
    }

    /// Run every evaluator, returning their scores in order
    pub async fn run(&mut self) -> Result<Vec<Scores>> {
        if self.evaluators.is_empty() {
            return Err(Error::Config("No evaluators configured".into()));
        }

        info!(
            task = %self.task,
            encoder = self.encoder.name(),
            evaluators = self.evaluators.len(),
            "Starting evaluation"
        );

        let mut all_scores = Vec::with_capacity(self.evaluators.len());
        for evaluator in &self.evaluators {
            let start = Instant::now();
            let (scores, cache) = match evaluator
                .evaluate(self.encoder.as_ref(), self.test_cache.clone())
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    warn!(evaluator = evaluator.name(), error = %e, "Evaluator failed");
                    return Err(e);
                }
            };

            if evaluator.prompts_test_inputs() {
                debug!(evaluator = evaluator.name(), "Not sharing prompted test embeddings");
            } else {
                self.test_cache = Some(cache);
            }

            info!(
                evaluator = evaluator.name(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                accuracy = scores.accuracy(),
                f1 = scores.f1(),
                ap = scores.ap(),
                "Evaluator finished"
            );
            all_scores.push(scores);
        }

        Ok(all_scores)
    }
}
