//! Classification metrics over predicted and true labels

use std::fmt;

use crate::error::{Error, Result};
use crate::types::{Label, unique_labels};

fn check_lengths(y_true: usize, y_pred: usize) -> Result<()> {
    if y_true != y_pred {
        return Err(Error::Shape(format!(
            "{} true labels but {} predictions",
            y_true, y_pred
        )));
    }
    if y_true == 0 {
        return Err(Error::EmptyInput("no labels to score".into()));
    }
    Ok(())
}

/// Confusion matrix over the sorted union of true and predicted labels.
///
/// `matrix[i][j]` counts samples whose true label is `labels[i]` and whose
/// predicted label is `labels[j]`.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    labels: Vec<Label>,
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[Label], y_pred: &[Label]) -> Result<Self> {
        check_lengths(y_true.len(), y_pred.len())?;

        let all: Vec<Label> = y_true.iter().chain(y_pred).copied().collect();
        let labels = unique_labels(&all);
        let n = labels.len();
        let mut matrix = vec![vec![0; n]; n];

        for (t, p) in y_true.iter().zip(y_pred) {
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                matrix[i][j] += 1;
            }
        }

        Ok(Self { labels, matrix })
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn true_positives(&self, class: usize) -> usize {
        self.matrix[class][class]
    }

    pub fn false_positives(&self, class: usize) -> usize {
        (0..self.labels.len())
            .filter(|&i| i != class)
            .map(|i| self.matrix[i][class])
            .sum()
    }

    pub fn false_negatives(&self, class: usize) -> usize {
        (0..self.labels.len())
            .filter(|&j| j != class)
            .map(|j| self.matrix[class][j])
            .sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.labels.len()).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }

    /// F1 for one class; 0 when the class never appears in either array
    pub fn f1(&self, class: usize) -> f64 {
        let tp = self.true_positives(class) as f64;
        let denom = 2.0 * tp + self.false_positives(class) as f64 + self.false_negatives(class) as f64;
        if denom > 0.0 { 2.0 * tp / denom } else { 0.0 }
    }

    /// Unweighted mean of per-class F1
    pub fn f1_macro(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        (0..self.labels.len()).map(|c| self.f1(c)).sum::<f64>() / self.labels.len() as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for label in &self.labels {
            write!(f, "{:>8}", label)?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.matrix) {
            write!(f, "{:>8}", label)?;
            for count in row {
                write!(f, "{:>8}", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Fraction of predictions equal to the true label
pub fn accuracy(y_true: &[Label], y_pred: &[Label]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Macro-averaged F1 over every label seen in either array
pub fn f1_macro(y_true: &[Label], y_pred: &[Label]) -> Result<f64> {
    Ok(ConfusionMatrix::from_predictions(y_true, y_pred)?.f1_macro())
}

/// Average precision of `y_score` ranking the samples whose label is `pos_label`.
///
/// Computed as `sum_n (R_n - R_{n-1}) * P_n` over distinct score thresholds,
/// highest first. Returns 0 when no sample carries `pos_label`.
pub fn average_precision(y_true: &[Label], y_score: &[f64], pos_label: Label) -> Result<f64> {
    check_lengths(y_true.len(), y_score.len())?;

    let positives = y_true.iter().filter(|&&t| t == pos_label).count();
    if positives == 0 {
        return Ok(0.0);
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[b].total_cmp(&y_score[a]));

    let mut ap = 0.0;
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut prev_recall = 0.0;

    let mut i = 0;
    while i < order.len() {
        let threshold = y_score[order[i]];
        // consume every sample tied at this threshold
        while i < order.len() && y_score[order[i]] == threshold {
            if y_true[order[i]] == pos_label {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let precision = tp as f64 / (tp + fp) as f64;
        let recall = tp as f64 / positives as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }

    Ok(ap)
}

/// Average precision using hard predictions as scores (1 when predicted positive)
pub fn average_precision_from_predictions(
    y_true: &[Label],
    y_pred: &[Label],
    pos_label: Label,
) -> Result<f64> {
    let scores: Vec<f64> = y_pred
        .iter()
        .map(|&p| if p == pos_label { 1.0 } else { 0.0 })
        .collect();
    average_precision(y_true, &scores, pos_label)
}

/// Positive label for a two-class problem: the larger of the two labels.
/// `None` unless `labels` holds exactly two distinct values.
pub fn binary_pos_label(labels: &[Label]) -> Option<Label> {
    match unique_labels(labels).as_slice() {
        [_, pos] => Some(*pos),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values from sklearn.metrics

    #[test]
    fn test_accuracy() {
        let y_true = [0, 0, 1, 1, 2, 2, 0, 1, 2];
        let y_pred = [0, 1, 1, 2, 2, 0, 0, 1, 2];
        let acc = accuracy(&y_true, &y_pred).unwrap();
        assert!((acc - 0.6666666666666666).abs() < 1e-9);
    }

    #[test]
    fn test_f1_macro_multiclass() {
        let y_true = [0, 0, 1, 1, 2, 2, 0, 1, 2];
        let y_pred = [0, 1, 1, 2, 2, 0, 0, 1, 2];
        let f1 = f1_macro(&y_true, &y_pred).unwrap();
        assert!((f1 - 0.6666666666666666).abs() < 1e-9);
    }

    #[test]
    fn test_f1_macro_counts_predicted_only_labels() {
        // label 9 is never true, so its F1 is 0 and pulls the mean down
        let y_true = [1, 1, 2, 2];
        let y_pred = [1, 1, 2, 9];
        let f1 = f1_macro(&y_true, &y_pred).unwrap();
        let expected = (1.0 + 2.0 / 3.0 + 0.0) / 3.0;
        assert!((f1 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_average_precision_hard_predictions() {
        // average_precision_score([0, 1, 1, 0, 1], [0, 1, 0, 1, 1]) = 0.6444...
        let y_true = [0, 1, 1, 0, 1];
        let y_pred = [0, 1, 0, 1, 1];
        let ap = average_precision_from_predictions(&y_true, &y_pred, 1).unwrap();
        assert!((ap - 29.0 / 45.0).abs() < 1e-9, "got {ap}");
    }

    #[test]
    fn test_average_precision_scores() {
        // average_precision_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) = 0.8333...
        let ap = average_precision(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8], 1).unwrap();
        assert!((ap - 0.8333333333333333).abs() < 1e-9);
    }

    #[test]
    fn test_average_precision_no_positives() {
        let ap = average_precision_from_predictions(&[0, 0], &[1, 0], 1).unwrap();
        assert_eq!(ap, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(accuracy(&[1, 2], &[1]), Err(Error::Shape(_))));
        assert!(matches!(f1_macro(&[], &[]), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_binary_pos_label() {
        assert_eq!(binary_pos_label(&[-1, 1, 1, -1]), Some(1));
        assert_eq!(binary_pos_label(&[0, 1, 2]), None);
        assert_eq!(binary_pos_label(&[4, 4]), None);
    }

    #[test]
    fn test_confusion_matrix_display() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[1, 1]).unwrap();
        assert_eq!(cm.labels(), &[0, 1]);
        assert!(cm.to_string().contains('1'));
    }
}
