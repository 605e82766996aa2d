//! Parallel CSR kernels. The CSR product is a second reference for the
//! map/reduce pipeline that never builds the dense matrix.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::{CsrMatrix, Vector};

/// `a b` computed row by row in parallel. A matrix in CSC storage is
/// converted to CSR first.
pub fn spmv(a: &CsrMatrix, b: &Vector) -> Result<Vector> {
    if !a.is_csr() {
        return spmv(&a.to_csr(), b);
    }
    if a.cols() != b.len() {
        return Err(Error::Dimension {
            context: "CSR matrix-vector product",
            expected: a.cols(),
            actual: b.len(),
        });
    }
    let c: Vec<f64> = (0..a.rows())
        .into_par_iter()
        .map(|i| match a.outer_view(i) {
            Some(row) => row.iter().map(|(j, val)| b[j] * val).sum::<f64>(),
            None => 0.0,
        })
        .collect();
    Ok(Vector::from(c))
}
