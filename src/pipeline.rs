//! The generate → save → load → multiply → validate workflow.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::compare::{compare, Comparison};
use crate::config::RunConfig;
use crate::dense::{multiply_dense, to_csr, to_dense};
use crate::engine::Engine;
use crate::entry::SparseMatrix;
use crate::error::{Error, Result};
use crate::generate::{random_matrix, random_vector, rng_from};
use crate::io::{load_coo, load_vector, save_coo};
use crate::parallel_ops::spmv;
use crate::Vector;

/// Wall clock time of each phase, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub prepare_ms: f64,
    pub multiply_ms: f64,
    pub dense_ms: f64,
    pub csr_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub config: RunConfig,
    pub engine: String,
    pub rows: usize,
    pub cols: usize,
    pub nnz: usize,
    /// Fraction of nonzero slots; sparsity is `1 - density`.
    pub density: f64,
    pub distinct_rows: usize,
    pub skipped: usize,
    pub dense: Comparison,
    pub csr: Comparison,
    pub timings: Timings,
}

impl Report {
    /// True when the product matches both references.
    pub fn agrees(&self) -> bool {
        self.dense.agrees && self.csr.agrees
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub report: Report,
    pub result: Vector,
}

fn millis(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1e3
}

/// Builds the matrix for a run: read from `config.input`, or generated,
/// written to the matrix file and read back from it.
pub fn prepare_matrix(config: &RunConfig, rng: &mut impl rand::Rng) -> Result<SparseMatrix> {
    let entries = match &config.input {
        Some(input) => {
            info!("Loading matrix from {}", input.display());
            load_coo(input)?
        }
        None => {
            let generated = random_matrix(rng, config.count, config.n);
            let path = match &config.matrix_file {
                Some(path) => path.clone(),
                None => config.output_path("matrix.coo")?,
            };
            save_coo(&path, &generated.entries)?;
            info!(
                "Wrote {} entries of a {n} x {n} matrix to {}",
                generated.nnz(),
                path.display(),
                n = config.n
            );
            load_coo(&path)?
        }
    };
    Ok(SparseMatrix {
        rows: config.n,
        cols: config.n,
        entries,
    })
}

/// Runs one multiplication on `engine` and checks it against the dense and
/// CSR references. Disagreement is reported, not returned as an error.
pub fn run_with<E: Engine>(
    config: &RunConfig,
    engine: &E,
    mat: SparseMatrix,
    x: Vector,
) -> Result<Outcome> {
    config.validate()?;
    if x.len() != mat.cols {
        return Err(Error::Dimension {
            context: "input vector",
            expected: mat.cols,
            actual: x.len(),
        });
    }
    let mut timings = Timings::default();

    let start = Instant::now();
    let result = mat.mul_vec_with(&config.spmv(), engine, &x)?;
    timings.multiply_ms = millis(start);
    info!(
        "{} engine: multiplied {} entries in {:.3} ms",
        engine.name(),
        mat.nnz(),
        timings.multiply_ms
    );

    // the references cannot hold out of range entries, so they see only
    // what the skip policy let through
    let mut valid = mat;
    let before = valid.nnz();
    let (rows, cols) = valid.shape();
    valid.entries.retain(|e| e.row < rows && e.col < cols);
    let skipped = before - valid.nnz();

    let start = Instant::now();
    let dense = multiply_dense(&to_dense(&valid)?, &x)?;
    timings.dense_ms = millis(start);

    let start = Instant::now();
    let csr = spmv(&to_csr(&valid)?, &x)?;
    timings.csr_ms = millis(start);
    debug!(
        "references: dense {:.3} ms, csr {:.3} ms",
        timings.dense_ms, timings.csr_ms
    );

    let dense = compare(&result, &dense, config.rel_tol)?;
    let csr = compare(&result, &csr, config.rel_tol)?;
    if dense.agrees && csr.agrees {
        info!(
            "Result agrees with the references (max rel diff {:.2e})",
            dense.max_rel_diff.max(csr.max_rel_diff)
        );
    } else {
        warn!(
            "Result disagrees: dense max rel diff {:.2e} at {:?}, csr max rel diff {:.2e} at {:?}",
            dense.max_rel_diff, dense.worst_index, csr.max_rel_diff, csr.worst_index
        );
    }

    let report = Report {
        config: config.clone(),
        engine: engine.name().to_string(),
        rows,
        cols,
        nnz: valid.nnz() + skipped,
        density: valid.density(),
        distinct_rows: valid.distinct_rows(),
        skipped,
        dense,
        csr,
        timings,
    };
    Ok(Outcome { report, result })
}

/// The full workflow driven by a config: matrix, vector, engine, product.
pub fn run(config: &RunConfig) -> Result<Outcome> {
    config.validate()?;
    let mut rng = rng_from(config.seed);

    let start = Instant::now();
    let mat = prepare_matrix(config, &mut rng)?;
    let x = match &config.vector_file {
        Some(path) => load_vector(path)?,
        None => random_vector(&mut rng, mat.cols),
    };
    let prepare_ms = millis(start);

    let engine = config.build_engine()?;
    let mut outcome = run_with(config, &engine, mat, x)?;
    outcome.report.timings.prepare_ms = prepare_ms;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineKind;
    use crate::engine::Sequential;
    use crate::entry::SparseEntry;
    use crate::spmv::OutOfRangePolicy;
    use ndarray::array;

    fn config_in(dir: &tempfile::TempDir) -> RunConfig {
        RunConfig {
            seed: Some(2024),
            partitions: 4,
            threads: 2,
            output_dir: Some(dir.path().to_path_buf()),
            ..RunConfig::default()
        }
    }

    #[test]
    fn generated_run_agrees_on_both_engines() {
        let dir = tempfile::tempdir().unwrap();
        for engine in [EngineKind::Sequential, EngineKind::Threaded] {
            let config = RunConfig {
                n: 50,
                count: 300,
                engine,
                ..config_in(&dir)
            };
            let outcome = run(&config).unwrap();
            assert!(outcome.report.agrees(), "{:?}", outcome.report);
            assert_eq!(outcome.result.len(), 50);
            assert_eq!(outcome.report.nnz, 300);
            assert!(dir.path().join("matrix.coo").is_file());
        }
    }

    #[test]
    fn sparse_run_keeps_every_row() {
        let dir = tempfile::tempdir().unwrap();
        // far fewer entries than rows, so most rows are empty
        let config = RunConfig {
            n: 1000,
            count: 10,
            ..config_in(&dir)
        };
        let outcome = run(&config).unwrap();
        assert_eq!(outcome.result.len(), 1000);
        assert!(outcome.report.distinct_rows <= 10);
        assert!(outcome.report.agrees());
    }

    #[test]
    fn skip_policy_reports_dropped_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            n: 2,
            policy: OutOfRangePolicy::Skip,
            ..config_in(&dir)
        };
        let mat = SparseMatrix {
            rows: 2,
            cols: 2,
            entries: vec![
                SparseEntry::new(0, 1, 2.0),
                SparseEntry::new(5, 0, 1.0),
                SparseEntry::new(1, 0, 3.0),
            ],
        };
        let outcome = run_with(&config, &Sequential, mat, array![5.0, 10.0]).unwrap();
        assert_eq!(outcome.result, array![20.0, 15.0]);
        assert_eq!(outcome.report.skipped, 1);
        assert!(outcome.report.agrees());
    }

    #[test]
    fn fail_policy_surfaces_index_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mat = SparseMatrix {
            rows: 2,
            cols: 2,
            entries: vec![SparseEntry::new(0, 7, 1.0)],
        };
        let err = run_with(&config_in(&dir), &Sequential, mat, array![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { .. }));
    }

    #[test]
    fn wrong_vector_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mat = SparseMatrix::new(3, 3);
        let err = run_with(&config_in(&dir), &Sequential, mat, array![1.0]).unwrap_err();
        assert!(matches!(err, Error::Dimension { .. }));
    }
}
