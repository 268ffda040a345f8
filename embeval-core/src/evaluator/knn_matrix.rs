use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    ClassificationEvaluator, DEFAULT_BATCH_SIZE, PredictionScores, encode_splits,
    record_per_metric, resolve_batch_size,
};
use crate::embeddings::TestCache;
use crate::encoder::SentenceEncoder;
use crate::error::{Error, Result};
use crate::knn::{DistanceMetric, predict_from_distances};
use crate::metrics::binary_pos_label;
use crate::splits::ClassificationSplits;
use crate::types::Scores;

const METRICS: [DistanceMetric; 3] = [
    DistanceMetric::Cosine,
    DistanceMetric::Euclidean,
    DistanceMetric::Dot,
];

/// k-NN evaluator that builds a full test x train distance matrix per metric
/// and takes the top-k smallest entries of each row
pub struct KnnMatrixEvaluator {
    splits: ClassificationSplits,
    k: usize,
    batch_size: usize,
}

impl KnnMatrixEvaluator {
    pub fn new(splits: ClassificationSplits, k: usize) -> Self {
        Self {
            splits,
            k,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = resolve_batch_size(batch_size);
        self
    }
}

#[async_trait]
impl ClassificationEvaluator for KnnMatrixEvaluator {
    fn name(&self) -> &str {
        "knn_matrix"
    }

    async fn evaluate(
        &self,
        encoder: &dyn SentenceEncoder,
        test_cache: Option<TestCache>,
    ) -> Result<(Scores, TestCache)> {
        info!(k = self.k, encoder = encoder.name(), "Running distance-matrix kNN evaluator");
        if self.k == 0 {
            return Err(Error::Config("k must be at least 1".into()));
        }

        let (x_train, test_cache) =
            encode_splits(encoder, &self.splits, self.batch_size, test_cache).await?;
        let x_test = test_cache.embeddings();
        let pos_label = binary_pos_label(&self.splits.y_train);

        let mut results = Vec::with_capacity(METRICS.len());
        for metric in METRICS {
            let distances = metric.distance_matrix(&x_test.view(), &x_train.view())?;
            let y_pred = predict_from_distances(&distances.view(), &self.splits.y_train, self.k)?;

            let s = PredictionScores::compute(&self.splits.y_test, &y_pred, pos_label)?;
            debug!(metric = %metric, accuracy = s.accuracy, f1 = s.f1, "kNN scored");
            results.push((metric.as_str(), s));
        }

        let mut scores = Scores::new(self.name());
        record_per_metric(&mut scores, &results);
        Ok((scores, test_cache))
    }
}
