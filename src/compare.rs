use approx::relative_eq;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::Vector;

/// Element-wise agreement between a computed vector and a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub len: usize,
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
    /// Position of the largest absolute difference, `None` for empty vectors.
    pub worst_index: Option<usize>,
    pub rel_tol: f64,
    pub agrees: bool,
}

/// Two elements agree when they are within `rel_tol` either absolutely or
/// relative to the larger magnitude.
pub fn compare(actual: &Vector, expected: &Vector, rel_tol: f64) -> Result<Comparison> {
    if actual.len() != expected.len() {
        return Err(Error::Dimension {
            context: "comparison",
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    let mut max_abs_diff = 0.0_f64;
    let mut max_rel_diff = 0.0_f64;
    let mut worst_index = None;
    let mut agrees = true;

    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        let abs = (a - e).abs();
        let scale = a.abs().max(e.abs());
        let rel = if scale > 0.0 { abs / scale } else { 0.0 };
        if worst_index.is_none() || abs > max_abs_diff {
            max_abs_diff = abs;
            worst_index = Some(i);
        }
        max_rel_diff = max_rel_diff.max(rel);
        agrees &= relative_eq!(a, e, epsilon = rel_tol, max_relative = rel_tol);
    }

    Ok(Comparison {
        len: actual.len(),
        max_abs_diff,
        max_rel_diff,
        worst_index,
        rel_tol,
        agrees,
    })
}
