//! Line-oriented file input.
//!
//! [`read_records`] opens a text file and parses it one line at a time with a
//! caller-supplied parser, skipping blank lines. Nothing is read until the
//! returned iterator is pulled, so a graph reading a large file keeps only the
//! current line in memory.
//!
//! JSON lines support lives in [`jsonl`] (feature `io-jsonl`).

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

use crate::record::Record;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parses one non-blank line of input into a record.
pub type LineParser = dyn Fn(&str) -> Result<Record> + Send + Sync;

/// Lazy iterator over the records parsed from a line-delimited file.
pub struct LineRecords {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    parser: Arc<LineParser>,
}

impl Iterator for LineRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    return Some(Err(e).with_context(|| {
                        format!("read line {} in {}", self.line_no, self.path.display())
                    }));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some((self.parser)(&line).with_context(|| {
                format!("parse line {} in {}", self.line_no, self.path.display())
            }));
        }
    }
}

/// Open `path` and parse it lazily with `parser`.
///
/// # Errors
/// Returns an error if the file cannot be opened. Read and parse errors are
/// reported per line by the iterator, with the line number attached.
pub fn read_records(path: impl AsRef<Path>, parser: Arc<LineParser>) -> Result<LineRecords> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(LineRecords {
        path: path.to_path_buf(),
        lines: BufReader::new(file).lines(),
        line_no: 0,
        parser,
    })
}
