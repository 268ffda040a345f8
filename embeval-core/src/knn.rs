//! k-nearest-neighbor classification over embeddings.
//!
//! Two routes to the same prediction exist: [`KNeighborsClassifier`] searches
//! the training set per query row in parallel, while
//! [`predict_from_distances`] works off a precomputed test x train distance
//! matrix (see [`DistanceMetric::distance_matrix`]).

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance::{cos_sim, dot_score, euclidean_dist};
use crate::error::{Error, Result};
use crate::types::Label;

/// How closeness between two embeddings is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos_sim`
    Cosine,
    /// L2 distance
    Euclidean,
    /// Negated dot product
    Dot,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dot => "dot",
        }
    }

    /// Test x train distance matrix; smaller means closer
    pub fn distance_matrix(
        &self,
        test: &ArrayView2<'_, f32>,
        train: &ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Cosine => Ok(cos_sim(test, train)?.mapv(|s| 1.0 - s)),
            Self::Euclidean => euclidean_dist(test, train),
            Self::Dot => Ok(dot_score(test, train)?.mapv(|s| -s)),
        }
    }

    fn pair_distance(&self, a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
        match self {
            Self::Cosine => {
                let norm_a = a.dot(&a).sqrt();
                let norm_b = b.dot(&b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - a.dot(&b) / (norm_a * norm_b)
                }
            }
            Self::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::Dot => -a.dot(&b),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most frequent label; ties go to the smallest label
pub fn majority_vote(labels: impl IntoIterator<Item = Label>) -> Option<Label> {
    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    // BTreeMap iterates in ascending label order, so `>` keeps the first (smallest) winner
    let mut best: Option<(Label, usize)> = None;
    for (label, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label)
}

/// Indices of the `k` smallest values, closest first; ties keep index order
fn smallest_k(distances: &[f32], k: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..distances.len()).collect();
    let cmp = |a: &usize, b: &usize| distances[*a].total_cmp(&distances[*b]).then(a.cmp(b));
    let k = k.min(idx.len());
    if k == 0 {
        return Vec::new();
    }
    if k < idx.len() {
        idx.select_nth_unstable_by(k - 1, cmp);
        idx.truncate(k);
    }
    idx.sort_unstable_by(cmp);
    idx
}

/// Predict each test row's label by majority vote among its `k` nearest
/// training rows, given a test x train distance matrix.
pub fn predict_from_distances(
    distances: &ArrayView2<'_, f32>,
    y_train: &[Label],
    k: usize,
) -> Result<Vec<Label>> {
    if k == 0 {
        return Err(Error::Config("k must be at least 1".into()));
    }
    if distances.ncols() != y_train.len() {
        return Err(Error::Shape(format!(
            "distance matrix has {} columns but there are {} training labels",
            distances.ncols(),
            y_train.len()
        )));
    }
    if y_train.is_empty() {
        return Err(Error::EmptyInput("no training labels".into()));
    }

    let rows: Vec<ArrayView1<'_, f32>> = distances.axis_iter(Axis(0)).collect();
    let predictions: Vec<Label> = rows
        .into_par_iter()
        .map(|row| {
            let row = row.to_vec();
            let neighbors = smallest_k(&row, k);
            majority_vote(neighbors.into_iter().map(|i| y_train[i])).unwrap_or_default()
        })
        .collect();

    Ok(predictions)
}

/// Brute-force k-nearest-neighbor classifier with uniform weights
#[derive(Debug, Clone)]
pub struct KNeighborsClassifier {
    k: usize,
    metric: DistanceMetric,
    train: Option<(Array2<f32>, Vec<Label>)>,
}

impl KNeighborsClassifier {
    pub fn new(k: usize, metric: DistanceMetric) -> Self {
        Self {
            k,
            metric,
            train: None,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Store the training set. Only `Cosine` and `Euclidean` are searchable;
    /// dot-product neighbors go through [`predict_from_distances`].
    pub fn fit(&mut self, x: &ArrayView2<'_, f32>, y: &[Label]) -> Result<()> {
        if self.k == 0 {
            return Err(Error::Config("k must be at least 1".into()));
        }
        if self.metric == DistanceMetric::Dot {
            return Err(Error::Config(
                "neighbor search supports cosine and euclidean metrics only".into(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(Error::Shape(format!(
                "{} training embeddings but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(Error::EmptyInput("cannot fit on an empty training set".into()));
        }
        self.train = Some((x.to_owned(), y.to_vec()));
        Ok(())
    }

    /// Predict one label per row of `x`
    pub fn predict(&self, x: &ArrayView2<'_, f32>) -> Result<Vec<Label>> {
        let (train_x, train_y) = self
            .train
            .as_ref()
            .ok_or_else(|| Error::Fit("classifier has not been fitted".into()))?;

        if x.ncols() != train_x.ncols() {
            return Err(Error::Shape(format!(
                "query dimension {} does not match training dimension {}",
                x.ncols(),
                train_x.ncols()
            )));
        }

        let metric = self.metric;
        let k = self.k;
        let queries: Vec<ArrayView1<'_, f32>> = x.axis_iter(Axis(0)).collect();

        let predictions: Vec<Label> = queries
            .into_par_iter()
            .map(|query| {
                let distances: Vec<f32> = train_x
                    .axis_iter(Axis(0))
                    .map(|row| metric.pair_distance(query, row))
                    .collect();
                let neighbors = smallest_k(&distances, k);
                majority_vote(neighbors.into_iter().map(|i| train_y[i])).unwrap_or_default()
            })
            .collect();

        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_majority_vote_tie_goes_to_smallest() {
        assert_eq!(majority_vote([3, 1, 3, 1]), Some(1));
        assert_eq!(majority_vote([2, 5, 5]), Some(5));
        assert_eq!(majority_vote(std::iter::empty()), None);
    }

    #[test]
    fn test_smallest_k_orders_and_breaks_ties_by_index() {
        let d = [0.5, 0.1, 0.5, 0.0, 0.9];
        assert_eq!(smallest_k(&d, 3), vec![3, 1, 0]);
        assert_eq!(smallest_k(&d, 10), vec![3, 1, 0, 2, 4]);
    }

    #[test]
    fn test_knn_euclidean_predicts_nearest() {
        let train = array![[0.0_f32, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
        let y = [0, 0, 1, 1];
        let mut knn = KNeighborsClassifier::new(1, DistanceMetric::Euclidean);
        knn.fit(&train.view(), &y).unwrap();

        let test = array![[0.2_f32, 0.1], [4.9, 5.2]];
        assert_eq!(knn.predict(&test.view()).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_knn_cosine_ignores_magnitude() {
        let train = array![[1.0_f32, 0.0], [0.0, 1.0]];
        let y = [7, 9];
        let mut knn = KNeighborsClassifier::new(1, DistanceMetric::Cosine);
        knn.fit(&train.view(), &y).unwrap();

        let test = array![[100.0_f32, 1.0], [0.1, 3.0]];
        assert_eq!(knn.predict(&test.view()).unwrap(), vec![7, 9]);
    }

    #[test]
    fn test_knn_k_larger_than_train_is_clamped() {
        let train = array![[0.0_f32], [1.0], [2.0]];
        let y = [4, 4, 2];
        let mut knn = KNeighborsClassifier::new(10, DistanceMetric::Euclidean);
        knn.fit(&train.view(), &y).unwrap();
        assert_eq!(knn.predict(&array![[2.0_f32]].view()).unwrap(), vec![4]);
    }

    #[test]
    fn test_knn_errors() {
        let mut knn = KNeighborsClassifier::new(0, DistanceMetric::Cosine);
        assert!(matches!(
            knn.fit(&array![[1.0_f32]].view(), &[1]),
            Err(Error::Config(_))
        ));

        let knn = KNeighborsClassifier::new(1, DistanceMetric::Cosine);
        assert!(matches!(
            knn.predict(&array![[1.0_f32]].view()),
            Err(Error::Fit(_))
        ));
    }

    #[test]
    fn test_knn_fit_on_empty_training_set() {
        let mut knn = KNeighborsClassifier::new(1, DistanceMetric::Euclidean);
        let x = Array2::<f32>::zeros((0, 3));
        assert!(matches!(knn.fit(&x.view(), &[]), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_knn_search_rejects_dot_metric() {
        let mut knn = KNeighborsClassifier::new(1, DistanceMetric::Dot);
        assert!(matches!(
            knn.fit(&array![[1.0_f32, 0.0]].view(), &[1]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_knn_tie_at_k2_goes_to_smallest_label() {
        let train = array![[0.0_f32], [2.0]];
        let y = [5, 3];
        let mut knn = KNeighborsClassifier::new(2, DistanceMetric::Euclidean);
        knn.fit(&train.view(), &y).unwrap();
        assert_eq!(knn.predict(&array![[1.0_f32]].view()).unwrap(), vec![3]);
    }

    #[test]
    fn test_nan_distances_do_not_panic() {
        let d = array![[f32::NAN, 0.5, 0.1]];
        assert_eq!(predict_from_distances(&d.view(), &[1, 2, 3], 1).unwrap(), vec![3]);
    }

    #[test]
    fn test_matrix_route_matches_classifier() {
        let train = array![[1.0_f32, 0.0], [0.9, 0.2], [0.0, 1.0], [-1.0, 0.1]];
        let y = [0, 0, 1, 2];
        let test = array![[1.0_f32, 0.1], [0.1, 0.9], [-0.8, 0.0]];

        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean] {
            let mut knn = KNeighborsClassifier::new(1, metric);
            knn.fit(&train.view(), &y).unwrap();
            let direct = knn.predict(&test.view()).unwrap();

            let d = metric.distance_matrix(&test.view(), &train.view()).unwrap();
            let via_matrix = predict_from_distances(&d.view(), &y, 1).unwrap();
            assert_eq!(direct, via_matrix, "metric {metric}");
        }
    }

    #[test]
    fn test_dot_metric_prefers_large_products() {
        let train = array![[1.0_f32, 0.0], [3.0, 0.0]];
        let y = [0, 1];
        let test = array![[1.0_f32, 0.0]];
        let d = DistanceMetric::Dot
            .distance_matrix(&test.view(), &train.view())
            .unwrap();
        assert_eq!(predict_from_distances(&d.view(), &y, 1).unwrap(), vec![1]);
    }
}
