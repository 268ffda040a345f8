use std::sync::Arc;

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};

/// Row-major matrix of sentence embeddings (one row per sentence)
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    matrix: Array2<f32>,
}

impl Embeddings {
    pub fn new(matrix: Array2<f32>) -> Self {
        Self { matrix }
    }

    /// Build from per-sentence vectors. All rows must share one dimension.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let n = rows.len();
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);

        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
            return Err(Error::Shape(format!(
                "embedding {} has dimension {}, expected {}",
                i,
                row.len(),
                dim
            )));
        }

        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((n, dim), flat)
            .map_err(|e| Error::Shape(format!("Failed to assemble embeddings: {}", e)))?;
        Ok(Self { matrix })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.matrix.view()
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.matrix
    }
}

/// Encoded test split kept around so later evaluators can skip re-encoding.
///
/// Clones share the same underlying matrix.
#[derive(Debug, Clone)]
pub struct TestCache {
    embeddings: Arc<Embeddings>,
}

impl TestCache {
    pub fn new(embeddings: Embeddings) -> Self {
        Self {
            embeddings: Arc::new(embeddings),
        }
    }

    pub fn embeddings(&self) -> &Embeddings {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Check that the cache was built for a test split of `expected` sentences
    pub fn check_len(&self, expected: usize) -> Result<()> {
        if self.len() != expected {
            return Err(Error::Shape(format!(
                "test cache holds {} embeddings but the test split has {} sentences",
                self.len(),
                expected
            )));
        }
        Ok(())
    }
}

impl From<Embeddings> for TestCache {
    fn from(embeddings: Embeddings) -> Self {
        Self::new(embeddings)
    }
}
