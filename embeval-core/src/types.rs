use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Class label attached to a sentence
pub type Label = i64;

/// Scores produced by a single evaluator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scores {
    /// Name of the evaluator that produced these scores
    pub evaluator: String,
    /// When the evaluation finished
    pub timestamp: DateTime<Utc>,
    /// Metric name to value, e.g. `accuracy`, `f1_cosine`
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl Scores {
    pub fn new(evaluator: impl Into<String>) -> Self {
        Self {
            evaluator: evaluator.into(),
            timestamp: Utc::now(),
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.get("accuracy")
    }

    pub fn f1(&self) -> Option<f64> {
        self.get("f1")
    }

    /// Average precision; only present for binary tasks
    pub fn ap(&self) -> Option<f64> {
        self.get("ap")
    }
}

/// Sorted distinct labels
pub fn unique_labels(labels: &[Label]) -> Vec<Label> {
    let mut unique = labels.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}
