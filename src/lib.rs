//! Sparse matrix-vector multiplication over a map/reduce style engine.
//!
//! <br>
//!
//! A sparse matrix is held as an unordered list of coordinate (COO) triples
//! `(row, col, value)`. The product `y = A x` is computed in three phases over a
//! partitioned collection of those triples:
//!
//! 1. *map* every entry `(i, j, v)` to the partial contribution `(i, v * x[j])`,
//! 2. *group and combine* the contributions sharing a row with `+`,
//! 3. *reassemble* the combined `(i, sum)` pairs into a dense vector of the
//!    declared row count, leaving rows without entries at `0.0`.
//!
//! The first two phases run on an [`engine::Engine`], an explicitly passed
//! handle that either folds partitions on the calling thread or fans them out
//! over a rayon thread pool. Since the combine step only relies on addition
//! being associative and commutative, every engine and every partitioning
//! yields the same answer up to rounding.
//!
//! The crate also carries what is needed to exercise the algorithm end to end:
//! a random COO generator, a plain text COO reader/writer, dense and CSR
//! reference products, and a comparison report.

use ndarray::{Array1, Array2};
use sprs::{CsMatBase, TriMatBase};

#[macro_use]
extern crate log;
extern crate approx;

pub mod compare;
pub mod config;
pub mod dense;
pub mod engine;
pub mod entry;
pub mod error;
pub mod generate;
pub mod io;
pub mod parallel_ops;
pub mod pipeline;
pub mod spmv;

pub use entry::{SparseEntry, SparseMatrix};
pub use error::{Error, Result};
pub use spmv::{multiply, OutOfRangePolicy, SpMV};

pub type CsrMatrix = CsMatBase<f64, usize, Vec<usize>, Vec<usize>, Vec<f64>, usize>;
pub type CooMatrix = TriMatBase<Vec<usize>, Vec<f64>>;
pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;

use lazy_static::lazy_static;

lazy_static! {
    static ref N_CPUS: usize = num_cpus::get();
}

/// Number of logical CPUs, used as the default partition and thread count.
pub fn n_cpus() -> usize {
    *N_CPUS
}
