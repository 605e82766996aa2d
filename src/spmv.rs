//! Sparse matrix-vector product as a map / combine / reassemble pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::engine::{Collection, Engine};
use crate::entry::{SparseEntry, SparseMatrix};
use crate::error::{Error, Result};
use crate::Vector;

/// What to do with an entry whose row or column falls outside the operands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutOfRangePolicy {
    /// Abort the whole product with `IndexOutOfRange`.
    #[default]
    Fail,
    /// Drop the entry, log it at `warn` and carry on.
    Skip,
}

/// Configured sparse matrix-vector multiplier.
///
/// The dense vector is shared read-only with every partition; only the
/// entries are split up.
#[derive(Debug, Clone, Copy)]
pub struct SpMV {
    partitions: usize,
    policy: OutOfRangePolicy,
}

impl Default for SpMV {
    fn default() -> Self {
        Self {
            partitions: crate::n_cpus(),
            policy: OutOfRangePolicy::Fail,
        }
    }
}

impl SpMV {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions.max(1);
        self
    }

    pub fn with_policy(mut self, policy: OutOfRangePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn policy(&self) -> OutOfRangePolicy {
        self.policy
    }

    /// Map and combine phases: the `(row, sum)` pairs for every row that has
    /// at least one entry, sorted by row. Empty rows are absent here.
    pub fn row_sums<E: Engine>(
        &self,
        engine: &E,
        entries: &[SparseEntry],
        x: &Vector,
        m: usize,
    ) -> Result<Vec<(usize, f64)>> {
        let n = x.len();
        let partial = |e: SparseEntry| -> Result<(usize, f64)> {
            if e.row >= m {
                return Err(Error::row_out_of_range(e.row, m));
            }
            let xj = x.get(e.col).ok_or_else(|| Error::col_out_of_range(e.col, n))?;
            Ok((e.row, e.value * xj))
        };

        let collection = Collection::parallelize(engine, entries.to_vec(), self.partitions);
        debug!(
            "{} engine: {} entries over {} partitions",
            engine.name(),
            entries.len(),
            collection.num_partitions()
        );

        let products = match self.policy {
            OutOfRangePolicy::Fail => collection.try_map(partial)?,
            OutOfRangePolicy::Skip => {
                let skipped = AtomicUsize::new(0);
                let products = collection.filter_map(|e| match partial(e) {
                    Ok(product) => Some(product),
                    Err(err) => {
                        warn!("skipping entry ({}, {}, {}): {}", e.row, e.col, e.value, err);
                        skipped.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                });
                let skipped = skipped.into_inner();
                if skipped > 0 {
                    warn!("skipped {} out of range entries", skipped);
                }
                products
            }
        };

        let sums = products.reduce_by_key(|a, b| a + b).sort_by_key().collect();
        Ok(sums)
    }

    /// Computes `A x` for the entries of `A`, returning a vector of length `m`.
    pub fn multiply<E: Engine>(
        &self,
        engine: &E,
        entries: &[SparseEntry],
        x: &Vector,
        m: usize,
    ) -> Result<Vector> {
        let sums = self.row_sums(engine, entries, x, m)?;
        trace!("{} of {} rows received contributions", sums.len(), m);
        scatter(&sums, m)
    }
}

/// Computes `A x` with the default multiplier settings.
///
/// `entries` are the nonzeros of `A` (duplicates add up), `m` the row count of
/// `A`. Any entry outside `m x x.len()` fails the product.
pub fn multiply<E: Engine>(
    engine: &E,
    entries: &[SparseEntry],
    x: &Vector,
    m: usize,
) -> Result<Vector> {
    SpMV::default().multiply(engine, entries, x, m)
}

/// Reassembly phase: writes `(row, sum)` pairs into a zeroed vector of
/// length `m`. Rows never mentioned stay `0.0`.
pub fn scatter(pairs: &[(usize, f64)], m: usize) -> Result<Vector> {
    let mut y = Vector::zeros(m);
    for &(row, sum) in pairs {
        let slot = y.get_mut(row).ok_or_else(|| Error::row_out_of_range(row, m))?;
        *slot += sum;
    }
    Ok(y)
}

impl SparseMatrix {
    /// `A x`, checking the declared shape against `x` before any work.
    pub fn mul_vec<E: Engine>(&self, engine: &E, x: &Vector) -> Result<Vector> {
        self.mul_vec_with(&SpMV::default(), engine, x)
    }

    pub fn mul_vec_with<E: Engine>(&self, spmv: &SpMV, engine: &E, x: &Vector) -> Result<Vector> {
        if x.len() != self.cols {
            return Err(Error::Dimension {
                context: "matrix-vector product",
                expected: self.cols,
                actual: x.len(),
            });
        }
        spmv.multiply(engine, &self.entries, x, self.rows)
    }
}

#[cfg(test)]
extern crate test_generator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::{multiply_dense, to_dense};
    use crate::engine::{Sequential, Threaded};
    use crate::io::load_coo;
    use approx::assert_relative_eq;
    use ndarray::array;
    use test_generator::test_resources;

    fn entries(triples: &[(usize, usize, f64)]) -> Vec<SparseEntry> {
        triples.iter().map(|&t| SparseEntry::from(t)).collect()
    }

    #[test]
    fn small_product() {
        let a = entries(&[(0, 1, 2.0), (1, 0, 3.0), (0, 0, 1.0)]);
        let x = array![5.0, 10.0];
        let y = multiply(&Sequential, &a, &x, 2).unwrap();
        assert_eq!(y, array![25.0, 15.0]);

        let threaded = Threaded::new(2).unwrap();
        let y = multiply(&threaded, &a, &x, 2).unwrap();
        assert_eq!(y, array![25.0, 15.0]);
    }

    #[test]
    fn duplicate_entries_are_summed() {
        let a = entries(&[(0, 0, 2.0), (0, 0, 3.0)]);
        let y = multiply(&Sequential, &a, &array![1.0], 1).unwrap();
        assert_eq!(y, array![5.0]);
    }

    #[test]
    fn empty_rows_are_zero_filled() {
        let a = entries(&[(1, 0, 2.0), (3, 1, 1.0)]);
        let x = array![1.0, 4.0];
        let spmv = SpMV::new().with_partitions(3);

        let sums = spmv.row_sums(&Sequential, &a, &x, 5).unwrap();
        assert_eq!(sums, vec![(1, 2.0), (3, 4.0)]);

        let y = spmv.multiply(&Sequential, &a, &x, 5).unwrap();
        assert_eq!(y.len(), 5);
        assert_eq!(y, array![0.0, 2.0, 0.0, 4.0, 0.0]);
    }

    #[test]
    fn no_entries_gives_zero_vector() {
        let y = multiply(&Sequential, &[], &array![1.0, 2.0], 3).unwrap();
        assert_eq!(y, array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_range_column_fails() {
        let a = entries(&[(0, 0, 1.0), (0, 5, 1.0)]);
        let err = multiply(&Sequential, &a, &array![1.0, 2.0], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                axis: crate::error::Axis::Col,
                index: 5,
                bound: 2
            }
        ));
    }

    #[test]
    fn out_of_range_row_fails() {
        let a = entries(&[(2, 0, 1.0)]);
        let threaded = Threaded::new(2).unwrap();
        let err = multiply(&threaded, &a, &array![1.0], 2).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                axis: crate::error::Axis::Row,
                index: 2,
                bound: 2
            }
        ));
    }

    #[test]
    fn skip_policy_drops_bad_entries() {
        let a = entries(&[(0, 0, 1.0), (0, 9, 1.0), (7, 0, 1.0), (1, 1, 2.0)]);
        let y = SpMV::new()
            .with_policy(OutOfRangePolicy::Skip)
            .multiply(&Sequential, &a, &array![3.0, 4.0], 2)
            .unwrap();
        assert_eq!(y, array![3.0, 8.0]);
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("skip".parse::<OutOfRangePolicy>().unwrap(), OutOfRangePolicy::Skip);
        assert_eq!("FAIL".parse::<OutOfRangePolicy>().unwrap(), OutOfRangePolicy::Fail);
        assert_eq!(OutOfRangePolicy::Skip.to_string(), "skip");
    }

    #[test]
    fn scatter_rejects_rows_past_the_end() {
        assert!(scatter(&[(3, 1.0)], 3).is_err());
        assert_eq!(scatter(&[(2, 1.0)], 3).unwrap(), array![0.0, 0.0, 1.0]);
    }

    #[test]
    fn mul_vec_checks_shape_eagerly() {
        let mut mat = SparseMatrix::new(2, 3);
        mat.push(0, 2, 1.0).unwrap();
        let err = mat.mul_vec(&Sequential, &array![1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::Dimension {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert_eq!(
            mat.mul_vec(&Sequential, &array![1.0, 1.0, 7.0]).unwrap(),
            array![7.0, 0.0]
        );
    }

    #[test_resources("test_matrices/*.coo")]
    fn fixture_matches_dense_product(path: &str) {
        let coo = load_coo(path).unwrap();
        let rows = coo.iter().map(|e| e.row + 1).max().unwrap_or(0);
        let cols = coo.iter().map(|e| e.col + 1).max().unwrap_or(0);
        let mat = SparseMatrix::from_entries(rows, cols, coo).unwrap();
        let x = Vector::from_iter((0..cols).map(|j| 1.0 + j as f64 * 0.5));

        let expected = multiply_dense(&to_dense(&mat).unwrap(), &x).unwrap();
        let threaded = Threaded::new(4).unwrap();
        for partitions in [1, 3, 8] {
            let spmv = SpMV::new().with_partitions(partitions);
            let seq = mat.mul_vec_with(&spmv, &Sequential, &x).unwrap();
            let par = mat.mul_vec_with(&spmv, &threaded, &x).unwrap();
            assert_eq!(seq.len(), rows);
            for i in 0..rows {
                assert_relative_eq!(seq[i], expected[i], epsilon = 1e-12, max_relative = 1e-9);
                assert_relative_eq!(par[i], expected[i], epsilon = 1e-12, max_relative = 1e-9);
            }
        }
    }
}
