use std::path::PathBuf;

use coo_spmv::config::{EngineKind, RunConfig};
use coo_spmv::io::{load_coo, load_vector, save_vector};
use coo_spmv::{OutOfRangePolicy, Result, SparseMatrix};
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "multiply_coo",
    about = "Multiply a COO matrix file by a vector file with the map/reduce pipeline"
)]
struct Opt {
    #[structopt(parse(from_os_str))]
    matrix: PathBuf,

    #[structopt(parse(from_os_str))]
    vector: PathBuf,

    /// Where to write the result vector
    #[structopt(parse(from_os_str))]
    output: PathBuf,

    /// Row count of the matrix; defaults to one past the largest row index
    #[structopt(short, long)]
    rows: Option<usize>,

    /// Engine to run on. Options are: sequential, threaded
    #[structopt(short, long, default_value = "threaded")]
    engine: EngineKind,

    #[structopt(short, long)]
    partitions: Option<usize>,

    /// What to do with out of range entries. Options are: fail, skip
    #[structopt(long, default_value = "fail")]
    policy: OutOfRangePolicy,
}

fn multiply(opt: &Opt) -> Result<()> {
    let entries = load_coo(&opt.matrix)?;
    let x = load_vector(&opt.vector)?;
    let rows = opt
        .rows
        .unwrap_or_else(|| entries.iter().map(|e| e.row + 1).max().unwrap_or(0));

    let mut config = RunConfig {
        engine: opt.engine,
        policy: opt.policy,
        ..RunConfig::default()
    };
    if let Some(partitions) = opt.partitions {
        config.partitions = partitions;
    }
    config.validate()?;

    let mat = SparseMatrix {
        rows,
        cols: x.len(),
        entries,
    };
    let engine = config.build_engine()?;
    let y = mat.mul_vec_with(&config.spmv(), &engine, &x)?;
    save_vector(&opt.output, &y)?;
    info!(
        "{} x {} product over {} entries written to {}",
        mat.rows,
        mat.cols,
        mat.nnz(),
        opt.output.display()
    );
    Ok(())
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    if let Err(err) = multiply(&opt) {
        error!("{}", err);
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
