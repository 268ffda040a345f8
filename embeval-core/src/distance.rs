//! Pairwise similarity and distance matrices between two sets of embeddings.
//!
//! Every function returns a matrix with one row per vector in `a` and one
//! column per vector in `b`.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

const NORM_EPS: f32 = 1e-12;

fn check_dims(a: &ArrayView2<'_, f32>, b: &ArrayView2<'_, f32>) -> Result<()> {
    if a.ncols() != b.ncols() {
        return Err(Error::Shape(format!(
            "cannot compare {}-dimensional vectors with {}-dimensional vectors",
            a.ncols(),
            b.ncols()
        )));
    }
    Ok(())
}

/// L2-normalize each row; rows with a norm below `1e-12` are divided by `1e-12`
pub fn normalize_rows(m: &ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = m.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt().max(NORM_EPS);
        row.mapv_inplace(|v| v / norm);
    }
    out
}

/// `res[i][j] = cos_sim(a[i], b[j])`
pub fn cos_sim(a: &ArrayView2<'_, f32>, b: &ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    check_dims(a, b)?;
    let a_norm = normalize_rows(a);
    let b_norm = normalize_rows(b);
    Ok(a_norm.dot(&b_norm.t()))
}

/// `res[i][j] = ||a[i] - b[j]||_2`
pub fn euclidean_dist(a: &ArrayView2<'_, f32>, b: &ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    check_dims(a, b)?;
    let mut out = Array2::<f32>::zeros((a.nrows(), b.nrows()));
    for (i, a_row) in a.axis_iter(Axis(0)).enumerate() {
        for (j, b_row) in b.axis_iter(Axis(0)).enumerate() {
            let sq: f32 = a_row
                .iter()
                .zip(b_row.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum();
            out[[i, j]] = sq.sqrt();
        }
    }
    Ok(out)
}

/// `res[i][j] = a[i] . b[j]`
pub fn dot_score(a: &ArrayView2<'_, f32>, b: &ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    check_dims(a, b)?;
    Ok(a.dot(&b.t()))
}

/// View a single vector as a one-row matrix
pub fn as_row(v: &[f32]) -> ArrayView2<'_, f32> {
    ArrayView1::from(v).insert_axis(Axis(0))
}
