use std::path::PathBuf;

use coo_spmv::generate::{random_matrix, random_vector, rng_from};
use coo_spmv::io::{save_coo, save_vector};
use structopt::StructOpt;

#[macro_use]
extern crate log;

#[derive(Debug, StructOpt)]
#[structopt(name = "generate_coo", about = "Write a random sparse matrix in COO text form")]
struct Opt {
    /// Output COO file
    #[structopt(parse(from_os_str))]
    output: PathBuf,

    /// Matrix dimension, rows and columns are drawn from [0, n)
    n: usize,

    /// Number of entries; coordinates may repeat
    count: usize,

    #[structopt(long)]
    seed: Option<u64>,

    /// Also write a random dense vector of length n here
    #[structopt(long, parse(from_os_str))]
    vector: Option<PathBuf>,
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();

    let mut rng = rng_from(opt.seed);
    let mat = random_matrix(&mut rng, opt.count, opt.n);
    if let Err(err) = save_coo(&opt.output, &mat.entries) {
        error!("could not write {}: {}", opt.output.display(), err);
        std::process::exit(1);
    }
    info!(
        "{} entries, density {:.4}, written to {}",
        mat.nnz(),
        mat.density(),
        opt.output.display()
    );

    if let Some(path) = opt.vector {
        let x = random_vector(&mut rng, opt.n);
        if let Err(err) = save_vector(&path, &x) {
            error!("could not write {}: {}", path.display(), err);
            std::process::exit(1);
        }
        info!("vector of length {} written to {}", opt.n, path.display());
    }
}
