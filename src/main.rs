use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use coo_spmv::config::{EngineKind, RunConfig};
use coo_spmv::io::save_vector;
use coo_spmv::pipeline::{run, Report};
use coo_spmv::{OutOfRangePolicy, Result};
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "coo_spmv",
    about = "Multiply a random (or given) COO matrix by a vector with map/reduce and check it against a dense product"
)]
struct Opt {
    /// JSON run configuration; flags below override its values
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Matrix dimension
    #[structopt(short, long)]
    n: Option<usize>,

    /// Number of random entries to generate
    #[structopt(long)]
    count: Option<usize>,

    #[structopt(long)]
    seed: Option<u64>,

    /// Number of partitions the entries are split into
    #[structopt(short, long)]
    partitions: Option<usize>,

    /// Engine to run on. Options are: sequential, threaded
    #[structopt(short, long)]
    engine: Option<EngineKind>,

    /// Worker threads for the threaded engine
    #[structopt(long)]
    threads: Option<usize>,

    /// Relative tolerance when comparing against the references
    #[structopt(long)]
    rel_tol: Option<f64>,

    /// What to do with out of range entries. Options are: fail, skip
    #[structopt(long)]
    policy: Option<OutOfRangePolicy>,

    /// Read the matrix from this COO file instead of generating one
    #[structopt(short, long, parse(from_os_str))]
    input: Option<PathBuf>,

    /// Read the dense vector from this file instead of generating one
    #[structopt(long, parse(from_os_str))]
    vector: Option<PathBuf>,

    /// Where the generated matrix is written before being loaded back
    #[structopt(long, parse(from_os_str))]
    matrix_file: Option<PathBuf>,

    #[structopt(short, long, parse(from_os_str))]
    output_dir: Option<PathBuf>,
}

impl Opt {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(n) = self.n {
            config.n = n;
        }
        if let Some(count) = self.count {
            config.count = count;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(partitions) = self.partitions {
            config.partitions = partitions;
        }
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(rel_tol) = self.rel_tol {
            config.rel_tol = rel_tol;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if self.input.is_some() {
            config.input = self.input;
        }
        if self.vector.is_some() {
            config.vector_file = self.vector;
        }
        if self.matrix_file.is_some() {
            config.matrix_file = self.matrix_file;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_report(report: &Report) {
    println!(
        "{} x {} matrix, {} entries, {} non-empty rows, sparsity {:.4}",
        report.rows,
        report.cols,
        report.nnz,
        report.distinct_rows,
        1.0 - report.density
    );
    println!(
        "{:>10} {:>15} {:>15} {:>10}",
        "reference", "max abs diff", "max rel diff", "agrees"
    );
    for (name, c) in [("dense", &report.dense), ("csr", &report.csr)] {
        println!(
            "{:>10} {:>15.3e} {:>15.3e} {:>10}",
            name, c.max_abs_diff, c.max_rel_diff, c.agrees
        );
    }
}

fn try_main(opt: Opt) -> Result<bool> {
    let config = opt.into_config()?;
    info!(
        "Starting {} run: n = {}, partitions = {}",
        config.engine, config.n, config.partitions
    );
    let outcome = run(&config)?;
    print_report(&outcome.report);

    save_vector(config.output_path("result.txt")?, &outcome.result)?;
    let report_path = config.output_path("report.json")?;
    let mut file = File::create(&report_path)?;
    file.write_all(serde_json::to_string_pretty(&outcome.report)?.as_bytes())?;
    trace!("report written to {}", report_path.display());

    Ok(outcome.report.agrees())
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    match try_main(opt) {
        Ok(true) => {}
        Ok(false) => {
            error!("map/reduce product does not match the reference");
            process::exit(2);
        }
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            process::exit(1);
        }
    }
}
