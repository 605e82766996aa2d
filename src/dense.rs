//! Reference products used to validate the map/reduce result.

use crate::entry::SparseMatrix;
use crate::error::{Error, Result};
use crate::{CsrMatrix, Matrix, Vector};

/// Materialises the matrix, summing repeated coordinates.
pub fn to_dense(mat: &SparseMatrix) -> Result<Matrix> {
    mat.validate()?;
    let mut dense = Matrix::zeros((mat.rows, mat.cols));
    for e in mat.iter() {
        dense[[e.row, e.col]] += e.value;
    }
    Ok(dense)
}

pub fn multiply_dense(a: &Matrix, x: &Vector) -> Result<Vector> {
    if a.ncols() != x.len() {
        return Err(Error::Dimension {
            context: "dense matrix-vector product",
            expected: a.ncols(),
            actual: x.len(),
        });
    }
    Ok(a.dot(x))
}

/// Compressed sparse row form of the matrix; duplicates are summed.
pub fn to_csr(mat: &SparseMatrix) -> Result<CsrMatrix> {
    Ok(mat.to_tri()?.to_csr::<usize>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::SparseEntry;
    use ndarray::array;

    #[test]
    fn dense_sums_duplicates() {
        let mat = SparseMatrix::from_entries(
            2,
            2,
            vec![
                SparseEntry::new(0, 1, 1.5),
                SparseEntry::new(0, 1, 0.5),
                SparseEntry::new(1, 0, 4.0),
            ],
        )
        .unwrap();
        assert_eq!(to_dense(&mat).unwrap(), array![[0.0, 2.0], [4.0, 0.0]]);
    }

    #[test]
    fn dense_product_and_mismatch() {
        let a = array![[1.0, 2.0], [3.0, 0.0]];
        assert_eq!(multiply_dense(&a, &array![5.0, 10.0]).unwrap(), array![25.0, 15.0]);
        assert!(matches!(
            multiply_dense(&a, &array![1.0]),
            Err(Error::Dimension {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn csr_shape_follows_declared_shape() {
        let mat = SparseMatrix::from_entries(4, 3, vec![SparseEntry::new(1, 1, 1.0)]).unwrap();
        let csr = to_csr(&mat).unwrap();
        assert_eq!(csr.shape(), (4, 3));
        assert_eq!(csr.nnz(), 1);
    }

    #[test]
    fn references_reject_entries_outside_shape() {
        let mat = SparseMatrix {
            rows: 1,
            cols: 1,
            entries: vec![SparseEntry::new(0, 3, 1.0)],
        };
        assert!(matches!(to_dense(&mat), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(to_csr(&mat), Err(Error::IndexOutOfRange { .. })));
    }
}
