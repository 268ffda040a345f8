use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Label;

/// A sentence with its class label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSentence {
    pub text: String,
    pub label: Label,
}

/// Split file format - labeled train and test sentences (YAML or JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitFile {
    pub train: Vec<LabeledSentence>,
    pub test: Vec<LabeledSentence>,
}

impl SplitFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// JSON is valid YAML, so one parser handles both formats
    pub fn from_str(yaml: &str) -> Result<Self> {
        let split_file: SplitFile = serde_yaml::from_str(yaml)?;
        Ok(split_file)
    }

    pub fn into_splits(self) -> Result<ClassificationSplits> {
        let (sentences_train, y_train) = self.train.into_iter().map(|s| (s.text, s.label)).unzip();
        let (sentences_test, y_test) = self.test.into_iter().map(|s| (s.text, s.label)).unzip();
        ClassificationSplits::new(sentences_train, y_train, sentences_test, y_test)
    }
}

/// Train and test sentences with their labels
#[derive(Debug, Clone)]
pub struct ClassificationSplits {
    pub sentences_train: Vec<String>,
    pub y_train: Vec<Label>,
    pub sentences_test: Vec<String>,
    pub y_test: Vec<Label>,
}

impl ClassificationSplits {
    pub fn new(
        sentences_train: Vec<String>,
        y_train: Vec<Label>,
        sentences_test: Vec<String>,
        y_test: Vec<Label>,
    ) -> Result<Self> {
        if sentences_train.len() != y_train.len() {
            return Err(Error::Shape(format!(
                "{} train sentences but {} train labels",
                sentences_train.len(),
                y_train.len()
            )));
        }
        if sentences_test.len() != y_test.len() {
            return Err(Error::Shape(format!(
                "{} test sentences but {} test labels",
                sentences_test.len(),
                y_test.len()
            )));
        }
        Ok(Self {
            sentences_train,
            y_train,
            sentences_test,
            y_test,
        })
    }

    /// Keep only the first `limit` items of every split
    pub fn limit(mut self, limit: usize) -> Self {
        self.sentences_train.truncate(limit);
        self.y_train.truncate(limit);
        self.sentences_test.truncate(limit);
        self.y_test.truncate(limit);
        self
    }

    /// Apply `limit` when one is configured
    pub fn with_limit(self, limit: Option<usize>) -> Self {
        match limit {
            Some(limit) => self.limit(limit),
            None => self,
        }
    }

    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_file_yaml() {
        let yaml = r#"
train:
  - { text: "great movie", label: 1 }
  - { text: "awful plot", label: 0 }
test:
  - { text: "loved it", label: 1 }
"#;
        let splits = SplitFile::from_str(yaml).unwrap().into_splits().unwrap();
        assert_eq!(splits.sentences_train, vec!["great movie", "awful plot"]);
        assert_eq!(splits.y_train, vec![1, 0]);
        assert_eq!(splits.test_len(), 1);
    }

    #[test]
    fn test_split_file_json() {
        let json = r#"{"train": [{"text": "a", "label": 2}], "test": [{"text": "b", "label": 3}]}"#;
        let splits = SplitFile::from_str(json).unwrap().into_splits().unwrap();
        assert_eq!(splits.y_test, vec![3]);
    }

    #[test]
    fn test_limit_truncates_every_split() {
        let splits = ClassificationSplits::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![0, 1, 0],
            vec!["d".into(), "e".into()],
            vec![1, 1],
        )
        .unwrap()
        .with_limit(Some(1));

        assert_eq!(splits.train_len(), 1);
        assert_eq!(splits.sentences_train, vec!["a"]);
        assert_eq!(splits.test_len(), 1);
        assert_eq!(splits.sentences_test, vec!["d"]);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = ClassificationSplits::new(vec!["a".into()], vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }
}
