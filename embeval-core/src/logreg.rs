//! Multinomial logistic regression fitted with L-BFGS.
//!
//! Minimizes the mean cross-entropy plus an L2 penalty on the weights,
//! `||W||^2 / (2 * C * n)`; the intercept is not penalized. Two-class problems
//! use the same softmax model.

use std::collections::VecDeque;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Label, unique_labels};

const HISTORY: usize = 10;
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;

/// Solver settings
#[derive(Debug, Clone, Copy)]
pub struct LogRegParams {
    /// Maximum L-BFGS iterations
    pub max_iter: usize,
    /// Inverse L2 regularization strength
    pub c: f64,
    /// Stop once every gradient entry is at most this in absolute value
    pub tol: f64,
    pub fit_intercept: bool,
}

impl Default for LogRegParams {
    fn default() -> Self {
        Self {
            max_iter: 100,
            c: 1.0,
            tol: 1e-4,
            fit_intercept: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    classes: Vec<Label>,
    /// `n_classes x n_features`
    coef: Array2<f64>,
    intercept: Array1<f64>,
    n_iter: usize,
    converged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    params: LogRegParams,
    fitted: Option<Fitted>,
}

impl LogisticRegression {
    pub fn new(params: LogRegParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.params.max_iter = max_iter;
        self
    }

    pub fn params(&self) -> &LogRegParams {
        &self.params
    }

    /// Sorted class labels seen during `fit`
    pub fn classes(&self) -> Option<&[Label]> {
        self.fitted.as_ref().map(|f| f.classes.as_slice())
    }

    /// Iterations used by the last fit, and whether it converged
    pub fn n_iter(&self) -> Option<(usize, bool)> {
        self.fitted.as_ref().map(|f| (f.n_iter, f.converged))
    }

    pub fn fit(&mut self, x: &ArrayView2<'_, f32>, y: &[Label]) -> Result<()> {
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
        if self.params.c <= 0.0 {
            return Err(Error::Config(format!("C must be positive, got {}", self.params.c)));
        }

        let classes = unique_labels(y);
        if classes.len() < 2 {
            return Err(Error::Fit(format!(
                "need at least 2 classes in the training labels, found {}",
                classes.len()
            )));
        }

        let targets: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let objective = Objective {
            x: x.mapv(f64::from),
            targets,
            n_classes: classes.len(),
            c: self.params.c,
            fit_intercept: self.params.fit_intercept,
        };

        let solution = lbfgs(&objective, &self.params)?;
        let (coef, intercept) = objective.unpack(&solution.theta)?;

        if solution.converged {
            debug!(iterations = solution.n_iter, loss = solution.loss, "L-BFGS converged");
        } else {
            warn!(
                iterations = solution.n_iter,
                max_iter = self.params.max_iter,
                "L-BFGS failed to converge; increase max_iter for a tighter fit"
            );
        }

        self.fitted = Some(Fitted {
            classes,
            coef: coef.to_owned(),
            intercept: intercept.to_owned(),
            n_iter: solution.n_iter,
            converged: solution.converged,
        });
        Ok(())
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| Error::Fit("classifier has not been fitted".into()))
    }

    fn logits(&self, x: &ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        if x.ncols() != fitted.coef.ncols() {
            return Err(Error::Shape(format!(
                "query dimension {} does not match training dimension {}",
                x.ncols(),
                fitted.coef.ncols()
            )));
        }
        Ok(x.mapv(f64::from).dot(&fitted.coef.t()) + &fitted.intercept)
    }

    /// Most probable class per row
    pub fn predict(&self, x: &ArrayView2<'_, f32>) -> Result<Vec<Label>> {
        let logits = self.logits(x)?;
        let classes = &self.fitted()?.classes;
        Ok(logits
            .axis_iter(Axis(0))
            .map(|row| classes[argmax(row)])
            .collect())
    }

    /// Class probabilities per row, columns in `classes()` order
    pub fn predict_proba(&self, x: &ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        let mut probs = self.logits(x)?;
        for mut row in probs.axis_iter_mut(Axis(0)) {
            let lse = log_sum_exp(row.view());
            row.mapv_inplace(|z| (z - lse).exp());
        }
        Ok(probs)
    }
}

fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate() {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

fn log_sum_exp(row: ArrayView1<'_, f64>) -> f64 {
    let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    max + row.mapv(|v| (v - max).exp()).sum().ln()
}

/// Penalized mean cross-entropy over a flattened `[W (row-major), b]` vector
struct Objective {
    x: Array2<f64>,
    targets: Vec<usize>,
    n_classes: usize,
    c: f64,
    fit_intercept: bool,
}

impl Objective {
    fn dim(&self) -> usize {
        self.n_classes * (self.x.ncols() + 1)
    }

    fn unpack<'a>(&self, theta: &'a [f64]) -> Result<(ArrayView2<'a, f64>, ArrayView1<'a, f64>)> {
        let split = self.n_classes * self.x.ncols();
        let w = ArrayView2::from_shape((self.n_classes, self.x.ncols()), &theta[..split])
            .map_err(|e| Error::Fit(format!("bad parameter layout: {}", e)))?;
        let b = ArrayView1::from(&theta[split..]);
        Ok((w, b))
    }

    fn loss_and_grad(&self, theta: &[f64]) -> Result<(f64, Vec<f64>)> {
        let (w, b) = self.unpack(theta)?;
        let n = self.x.nrows() as f64;

        let mut delta = self.x.dot(&w.t()) + &b;
        let mut loss = 0.0;
        for (mut row, &target) in delta.axis_iter_mut(Axis(0)).zip(&self.targets) {
            let lse = log_sum_exp(row.view());
            loss += lse - row[target];
            row.mapv_inplace(|z| (z - lse).exp());
            row[target] -= 1.0;
        }
        delta /= n;

        let penalty = 1.0 / (self.c * n);
        loss = loss / n + 0.5 * penalty * w.iter().map(|v| v * v).sum::<f64>();

        let grad_w = delta.t().dot(&self.x) + &(&w * penalty);
        let mut grad = grad_w.iter().copied().collect::<Vec<_>>();
        if self.fit_intercept {
            grad.extend(delta.sum_axis(Axis(0)).iter().copied());
        } else {
            grad.extend(std::iter::repeat_n(0.0, self.n_classes));
        }
        Ok((loss, grad))
    }
}

struct Solution {
    theta: Vec<f64>,
    loss: f64,
    n_iter: usize,
    converged: bool,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn lbfgs(objective: &Objective, params: &LogRegParams) -> Result<Solution> {
    let mut theta = vec![0.0; objective.dim()];
    let (mut loss, mut grad) = objective.loss_and_grad(&theta)?;

    let mut s_hist: VecDeque<Vec<f64>> = VecDeque::with_capacity(HISTORY);
    let mut y_hist: VecDeque<Vec<f64>> = VecDeque::with_capacity(HISTORY);
    let mut rho_hist: VecDeque<f64> = VecDeque::with_capacity(HISTORY);

    let mut n_iter = 0;
    let mut converged = max_abs(&grad) <= params.tol;

    while !converged && n_iter < params.max_iter {
        // two-loop recursion: direction = -H * grad
        let mut q = grad.clone();
        let mut alphas = vec![0.0; s_hist.len()];
        for i in (0..s_hist.len()).rev() {
            alphas[i] = rho_hist[i] * dot(&s_hist[i], &q);
            axpy(-alphas[i], &y_hist[i], &mut q);
        }
        let gamma = match (s_hist.back(), y_hist.back()) {
            (Some(s), Some(y)) => dot(s, y) / dot(y, y),
            _ => 1.0 / dot(&grad, &grad).sqrt().max(1.0),
        };
        q.iter_mut().for_each(|v| *v *= gamma);
        for i in 0..s_hist.len() {
            let beta = rho_hist[i] * dot(&y_hist[i], &q);
            axpy(alphas[i] - beta, &s_hist[i], &mut q);
        }
        let mut direction: Vec<f64> = q.into_iter().map(|v| -v).collect();

        let mut slope = dot(&grad, &direction);
        if slope >= 0.0 {
            // not a descent direction; restart from steepest descent
            s_hist.clear();
            y_hist.clear();
            rho_hist.clear();
            direction = grad.iter().map(|g| -g).collect();
            slope = -dot(&grad, &grad);
        }

        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let mut candidate = theta.clone();
            axpy(step, &direction, &mut candidate);
            let (new_loss, new_grad) = objective.loss_and_grad(&candidate)?;
            if new_loss.is_finite() && new_loss <= loss + ARMIJO_C1 * step * slope {
                accepted = Some((candidate, new_loss, new_grad));
                break;
            }
            step *= 0.5;
        }

        let Some((new_theta, new_loss, new_grad)) = accepted else {
            debug!(iteration = n_iter, "line search made no progress");
            break;
        };

        let s: Vec<f64> = new_theta.iter().zip(&theta).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = new_grad.iter().zip(&grad).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            if s_hist.len() == HISTORY {
                s_hist.pop_front();
                y_hist.pop_front();
                rho_hist.pop_front();
            }
            s_hist.push_back(s);
            y_hist.push_back(y);
            rho_hist.push_back(1.0 / sy);
        }

        theta = new_theta;
        loss = new_loss;
        grad = new_grad;
        n_iter += 1;
        converged = max_abs(&grad) <= params.tol;
    }

    Ok(Solution {
        theta,
        loss,
        n_iter,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_separable() {
        let x = array![[2.0_f32], [3.0], [5.0], [6.0]];
        let y = [0, 0, 1, 1];
        let mut clf = LogisticRegression::default();
        clf.fit(&x.view(), &y).unwrap();

        assert_eq!(clf.classes(), Some(&[0, 1][..]));
        let test = array![[2.5_f32], [3.5], [4.5], [5.5]];
        assert_eq!(clf.predict(&test.view()).unwrap(), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_multiclass_blobs() {
        let x = array![
            [5.0_f32, 0.0],
            [4.5, 0.5],
            [0.0, 5.0],
            [0.5, 4.5],
            [-5.0, -5.0],
            [-4.5, -5.5]
        ];
        let y = [10, 10, 20, 20, 30, 30];
        let mut clf = LogisticRegression::default();
        clf.fit(&x.view(), &y).unwrap();

        let test = array![[4.0_f32, 1.0], [1.0, 4.0], [-4.0, -4.0]];
        assert_eq!(clf.predict(&test.view()).unwrap(), vec![10, 20, 30]);

        let proba = clf.predict_proba(&test.view()).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let objective = Objective {
            x: array![[1.0, -2.0], [0.5, 0.3], [-1.0, 1.5]],
            targets: vec![0, 2, 1],
            n_classes: 3,
            c: 0.7,
            fit_intercept: true,
        };
        let theta: Vec<f64> = (0..objective.dim()).map(|i| 0.1 * i as f64 - 0.3).collect();
        let (_, grad) = objective.loss_and_grad(&theta).unwrap();

        let h = 1e-6;
        for i in 0..theta.len() {
            let mut plus = theta.clone();
            let mut minus = theta.clone();
            plus[i] += h;
            minus[i] -= h;
            let numeric = (objective.loss_and_grad(&plus).unwrap().0
                - objective.loss_and_grad(&minus).unwrap().0)
                / (2.0 * h);
            assert!((numeric - grad[i]).abs() < 1e-6, "param {i}: {numeric} vs {}", grad[i]);
        }
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[1.0_f32], [2.0]];
        let mut clf = LogisticRegression::default();
        assert!(matches!(clf.fit(&x.view(), &[3, 3]), Err(Error::Fit(_))));
    }

    #[test]
    fn test_fit_on_empty_training_set() {
        let x = Array2::<f32>::zeros((0, 3));
        let mut clf = LogisticRegression::default();
        assert!(matches!(clf.fit(&x.view(), &[]), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_predict_before_fit() {
        let clf = LogisticRegression::default();
        assert!(matches!(
            clf.predict(&array![[1.0_f32]].view()),
            Err(Error::Fit(_))
        ));
    }

    #[test]
    fn test_iteration_budget_respected() {
        let x = array![[0.0_f32, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        let y = [0, 1, 1, 0];
        let mut clf = LogisticRegression::default().with_max_iter(2);
        clf.fit(&x.view(), &y).unwrap();
        let (n_iter, _) = clf.n_iter().unwrap();
        assert!(n_iter <= 2);
    }
}
