//! Run configuration shared by the command line drivers.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::engine::{Engine, Sequential, Threaded};
use crate::error::{Error, Result};
use crate::spmv::{OutOfRangePolicy, SpMV};

lazy_static! {
    // picked once per process so every file of a run shares a directory
    static ref DEFAULT_OUTPUT_DIR: PathBuf = {
        let base = Path::new("./output");
        let ts = Local::now().format("%Y-%m-%d_%H:%M:%S").to_string();
        let mut candidate = base.join(&ts);
        let mut suffix = 0u32;
        while candidate.exists() {
            suffix += 1;
            candidate = base.join(format!("{}_{}", ts, suffix));
        }
        candidate
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EngineKind {
    Sequential,
    Threaded,
}

/// Either engine, picked at run time.
pub enum AnyEngine {
    Sequential(Sequential),
    Threaded(Threaded),
}

impl Engine for AnyEngine {
    fn name(&self) -> &'static str {
        match self {
            AnyEngine::Sequential(e) => e.name(),
            AnyEngine::Threaded(e) => e.name(),
        }
    }

    fn run_partitions<T, U, F>(&self, partitions: Vec<Vec<T>>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(usize, Vec<T>) -> U + Sync + Send,
    {
        match self {
            AnyEngine::Sequential(e) => e.run_partitions(partitions, f),
            AnyEngine::Threaded(e) => e.run_partitions(partitions, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Matrix dimension; the generated matrix is `n x n`.
    pub n: usize,
    /// Number of generated entries, duplicates included.
    pub count: usize,
    pub seed: Option<u64>,
    pub partitions: usize,
    pub engine: EngineKind,
    /// Worker threads for the threaded engine, `0` for one per CPU.
    pub threads: usize,
    /// Relative tolerance for the comparison against the references.
    pub rel_tol: f64,
    pub policy: OutOfRangePolicy,
    /// COO file the generated matrix is written to and read back from.
    pub matrix_file: Option<PathBuf>,
    /// Existing COO file to use instead of generating a matrix.
    pub input: Option<PathBuf>,
    /// Dense vector to multiply with; random when absent.
    pub vector_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n: 10,
            count: 20,
            seed: None,
            partitions: crate::n_cpus(),
            engine: EngineKind::Threaded,
            threads: 0,
            rel_tol: 1e-9,
            policy: OutOfRangePolicy::Fail,
            matrix_file: None,
            input: None,
            vector_file: None,
            output_dir: None,
        }
    }
}

impl RunConfig {
    /// Reads a JSON config; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.partitions == 0 {
            return Err(Error::Config("partitions must be at least 1".into()));
        }
        if !(self.rel_tol.is_finite() && self.rel_tol >= 0.0) {
            return Err(Error::Config(format!(
                "rel_tol must be a non-negative number, got {}",
                self.rel_tol
            )));
        }
        if self.input.is_none() && self.count > 0 && self.n == 0 {
            return Err(Error::Config("cannot place entries in a 0 x 0 matrix".into()));
        }
        Ok(())
    }

    pub fn build_engine(&self) -> Result<AnyEngine> {
        Ok(match self.engine {
            EngineKind::Sequential => AnyEngine::Sequential(Sequential),
            EngineKind::Threaded => AnyEngine::Threaded(Threaded::new(self.threads)?),
        })
    }

    pub fn spmv(&self) -> SpMV {
        SpMV::new()
            .with_partitions(self.partitions)
            .with_policy(self.policy)
    }

    /// Directory for this run's files, created on first use. Defaults to a
    /// timestamped directory under `./output`, the same one for
    /// every call within a process.
    pub fn output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        fs::create_dir_all(DEFAULT_OUTPUT_DIR.as_path())?;
        Ok(DEFAULT_OUTPUT_DIR.clone())
    }

    /// Helper to build paths inside the output directory.
    pub fn output_path<S: AsRef<Path>>(&self, file: S) -> Result<PathBuf> {
        Ok(self.output_dir()?.join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "n": 100, "engine": "sequential", "policy": "skip" }"#).unwrap();

        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.n, 100);
        assert_eq!(config.count, 20);
        assert_eq!(config.engine, EngineKind::Sequential);
        assert_eq!(config.policy, OutOfRangePolicy::Skip);
        assert_eq!(config.rel_tol, 1e-9);
    }

    #[test]
    fn rejects_zero_partitions() {
        let config = RunConfig {
            partitions: 0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn engine_kind_parses_case_insensitively() {
        assert_eq!("Threaded".parse::<EngineKind>().unwrap(), EngineKind::Threaded);
        assert_eq!("SEQUENTIAL".parse::<EngineKind>().unwrap(), EngineKind::Sequential);
        assert!("spark".parse::<EngineKind>().is_err());
    }

    #[test]
    fn explicit_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            output_dir: Some(dir.path().join("nested/run")),
            ..RunConfig::default()
        };
        let path = config.output_path("report.json").unwrap();
        assert!(dir.path().join("nested/run").is_dir());
        assert_eq!(path, dir.path().join("nested/run/report.json"));
    }
}
