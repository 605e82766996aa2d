use serde::{Deserialize, Serialize};
use sprs::TriMat;

use crate::error::{Error, Result};
use crate::CooMatrix;

/// One nonzero of a matrix, `A[row][col] = value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparseEntry {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl SparseEntry {
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }
}

impl From<(usize, usize, f64)> for SparseEntry {
    fn from((row, col, value): (usize, usize, f64)) -> Self {
        Self { row, col, value }
    }
}

/// A list of coordinate entries together with the declared shape.
///
/// Entries are unordered and repeated coordinates are allowed; every
/// consumer treats them as independent contributions that add up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    pub rows: usize,
    pub cols: usize,
    pub entries: Vec<SparseEntry>,
}

impl SparseMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            entries: Vec::new(),
        }
    }

    /// Wraps an existing entry list, checking every index against the shape.
    pub fn from_entries(rows: usize, cols: usize, entries: Vec<SparseEntry>) -> Result<Self> {
        let mat = Self {
            rows,
            cols,
            entries,
        };
        mat.validate()?;
        Ok(mat)
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check(&SparseEntry { row, col, value })?;
        self.entries.push(SparseEntry { row, col, value });
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.entries.iter().try_for_each(|e| self.check(e))
    }

    fn check(&self, entry: &SparseEntry) -> Result<()> {
        if entry.row >= self.rows {
            return Err(Error::row_out_of_range(entry.row, self.rows));
        }
        if entry.col >= self.cols {
            return Err(Error::col_out_of_range(entry.col, self.cols));
        }
        Ok(())
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored entries, duplicates included.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Fraction of matrix slots holding a stored entry. Repeated
    /// coordinates count once.
    pub fn density(&self) -> f64 {
        // in f64 so huge shapes cannot overflow usize
        let slots = self.rows as f64 * self.cols as f64;
        if slots == 0.0 {
            return 0.0;
        }
        let mut coords: Vec<(usize, usize)> =
            self.entries.iter().map(|e| (e.row, e.col)).collect();
        coords.sort_unstable();
        coords.dedup();
        coords.len() as f64 / slots
    }

    /// Number of distinct rows that hold at least one entry.
    pub fn distinct_rows(&self) -> usize {
        let mut rows: Vec<usize> = self.entries.iter().map(|e| e.row).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SparseEntry> {
        self.entries.iter()
    }

    /// Triplet form for sprs. Fails if any entry lies outside the shape.
    pub fn to_tri(&self) -> Result<CooMatrix> {
        self.validate()?;
        let mut tri = TriMat::with_capacity((self.rows, self.cols), self.entries.len());
        for e in self.entries.iter() {
            tri.add_triplet(e.row, e.col, e.value);
        }
        Ok(tri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_indices_outside_shape() {
        let mut mat = SparseMatrix::new(2, 3);
        mat.push(1, 2, 4.0).unwrap();
        assert!(matches!(
            mat.push(2, 0, 1.0),
            Err(Error::IndexOutOfRange { index: 2, bound: 2, .. })
        ));
        assert!(matches!(
            mat.push(0, 3, 1.0),
            Err(Error::IndexOutOfRange { index: 3, bound: 3, .. })
        ));
        assert_eq!(mat.nnz(), 1);
    }

    #[test]
    fn density_counts_repeated_coordinates_once() {
        let entries = vec![
            SparseEntry::new(0, 0, 1.0),
            SparseEntry::new(0, 0, 2.0),
            SparseEntry::new(1, 1, 3.0),
        ];
        let mat = SparseMatrix::from_entries(2, 2, entries).unwrap();
        assert_eq!(mat.nnz(), 3);
        assert!((mat.density() - 0.5).abs() < 1e-12);
        assert_eq!(mat.distinct_rows(), 2);
    }

    #[test]
    fn density_of_huge_shape_does_not_overflow() {
        let mut mat = SparseMatrix::new(1 << 33, 1 << 33);
        mat.push(3, 5, 1.0).unwrap();
        let density = mat.density();
        assert!(density > 0.0);
        assert!((density - 2f64.powi(-66)).abs() < 1e-30);
        assert_eq!(SparseMatrix::new(0, 1 << 40).density(), 0.0);
    }

    #[test]
    fn tri_keeps_duplicates_for_summation() {
        let entries = vec![SparseEntry::new(0, 0, 2.0), SparseEntry::new(0, 0, 3.0)];
        let mat = SparseMatrix::from_entries(1, 1, entries).unwrap();
        let csr = mat.to_tri().unwrap().to_csr::<usize>();
        assert_eq!(csr.get(0, 0), Some(&5.0));
    }
}
