//! Plain text formats for coordinate matrices and dense vectors.
//!
//! A COO file has one entry per line, `row col value`, whitespace separated.
//! Indices are written as floats (`3.0`) but must hold non-negative integers.
//! There is no header and no entry count; the shape travels out of band.
//! Indices up to 2^53 survive the float encoding exactly and read back.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use crate::entry::SparseEntry;
use crate::error::{Error, Result};
use crate::Vector;

/// Largest index a float field holds exactly.
const MAX_INDEX: f64 = 9_007_199_254_740_992.0;

/// A line that is not UTF-8 is a malformed record, not an IO failure.
fn text_line(line: io::Result<String>, number: usize) -> Result<String> {
    match line {
        Ok(line) => Ok(line),
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            Err(Error::parse(number, "line is not valid UTF-8"))
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_float(field: &str, line: usize, what: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|_| Error::parse(line, format!("{what} `{field}` is not a number")))
}

fn parse_index(field: &str, line: usize, what: &str) -> Result<usize> {
    let value = parse_float(field, line, what)?;
    if !value.is_finite()
        || value < 0.0
        || value.fract() != 0.0
        || value > MAX_INDEX
        || value > usize::MAX as f64
    {
        return Err(Error::parse(
            line,
            format!("{what} `{field}` is not a valid index"),
        ));
    }
    Ok(value as usize)
}

/// Parses a single record; `line` is the 1-based line number used in errors.
pub fn parse_entry(record: &str, line: usize) -> Result<SparseEntry> {
    let fields: Vec<&str> = record.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(Error::parse(
            line,
            format!("expected 3 fields, found {}", fields.len()),
        ));
    }
    Ok(SparseEntry {
        row: parse_index(fields[0], line, "row")?,
        col: parse_index(fields[1], line, "column")?,
        value: parse_float(fields[2], line, "value")?,
    })
}

pub fn read_coo<R: Read>(reader: R) -> Result<Vec<SparseEntry>> {
    let mut entries = Vec::new();
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line = text_line(line, i + 1)?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parse_entry(&line, i + 1)?);
    }
    Ok(entries)
}

pub fn write_coo<W: Write>(writer: W, entries: &[SparseEntry]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for e in entries {
        writeln!(writer, "{:?} {:?} {:?}", e.row as f64, e.col as f64, e.value)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_coo<P: AsRef<Path>>(path: P) -> Result<Vec<SparseEntry>> {
    let path = path.as_ref();
    let entries = read_coo(File::open(path)?)?;
    trace!("loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

pub fn save_coo<P: AsRef<Path>>(path: P, entries: &[SparseEntry]) -> Result<()> {
    let path = path.as_ref();
    write_coo(File::create(path)?, entries)?;
    trace!("wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Reads every whitespace-separated float in the stream, in order.
pub fn read_vector<R: Read>(reader: R) -> Result<Vector> {
    let mut data = Vec::new();
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line = text_line(line, i + 1)?;
        for field in line.split_whitespace() {
            data.push(parse_float(field, i + 1, "vector element")?);
        }
    }
    Ok(Vector::from(data))
}

pub fn write_vector<W: Write>(writer: W, x: &Vector) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for v in x.iter() {
        writeln!(writer, "{:?}", v)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_vector<P: AsRef<Path>>(path: P) -> Result<Vector> {
    read_vector(File::open(path)?)
}

pub fn save_vector<P: AsRef<Path>>(path: P, x: &Vector) -> Result<()> {
    write_vector(File::create(path)?, x)
}
