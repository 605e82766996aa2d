//! Error types shared by every module of the crate.

use std::fmt;

use thiserror::Error;

/// Which index of a sparse entry was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => write!(f, "row"),
            Axis::Col => write!(f, "column"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// A record of a COO or vector file could not be parsed.
    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// An entry points outside the matrix or the vector.
    #[error("{axis} index {index} out of range (bound {bound})")]
    IndexOutOfRange { axis: Axis, index: usize, bound: usize },

    /// Declared shapes of the operands do not line up.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    Dimension {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    pub fn row_out_of_range(index: usize, bound: usize) -> Self {
        Self::IndexOutOfRange {
            axis: Axis::Row,
            index,
            bound,
        }
    }

    pub fn col_out_of_range(index: usize, bound: usize) -> Self {
        Self::IndexOutOfRange {
            axis: Axis::Col,
            index,
            bound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_index() {
        let err = Error::col_out_of_range(5, 2);
        assert_eq!(err.to_string(), "column index 5 out of range (bound 2)");

        let err = Error::parse(3, "expected 3 fields, found 2");
        assert_eq!(
            err.to_string(),
            "parse error on line 3: expected 3 fields, found 2"
        );
    }
}
