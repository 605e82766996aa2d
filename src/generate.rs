use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::entry::{SparseEntry, SparseMatrix};
use crate::Vector;

/// Seeded generator when a seed is given, entropy seeded otherwise.
pub fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// `count` entries with row and column uniform in `[0, n)` and value uniform
/// in `[0, 1)`. Coordinates may repeat.
pub fn random_entries<R: Rng + ?Sized>(rng: &mut R, count: usize, n: usize) -> Vec<SparseEntry> {
    if n == 0 {
        return Vec::new();
    }
    let index = Uniform::new(0, n);
    let value = Uniform::new(0.0_f64, 1.0_f64);
    (0..count)
        .map(|_| SparseEntry {
            row: index.sample(rng),
            col: index.sample(rng),
            value: value.sample(rng),
        })
        .collect()
}

pub fn random_matrix<R: Rng + ?Sized>(rng: &mut R, count: usize, n: usize) -> SparseMatrix {
    SparseMatrix {
        rows: n,
        cols: n,
        entries: random_entries(rng, count, n),
    }
}

pub fn random_vector<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vector {
    let distribution = Uniform::new(0.0_f64, 1.0_f64);
    Vector::from_iter((0..n).map(|_| distribution.sample(rng)))
}
