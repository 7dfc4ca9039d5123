//! Edge-list parser
//!
//! Reads one `src dst` pair per line, separated by tabs or spaces. Blank lines
//! and comment lines starting with `#` or `%` are skipped, as are self-loops.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;
use thiserror::Error;
use tristream_sampling::{Edge, VertexId};

/// Edge source errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// A line does not hold two vertex ids
    #[error("Line {line}: expected two vertex ids, got {content:?}")]
    Malformed { line: usize, content: String },

    /// Reading the source failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streaming edge reader
pub struct EdgeParser<R: Read> {
    lines: Lines<BufReader<R>>,
    line_no: usize,
    self_loops: u64,
}

impl EdgeParser<File> {
    /// Open an edge-list file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> EdgeParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            line_no: 0,
            self_loops: 0,
        }
    }

    /// Self-loops skipped so far
    pub fn self_loops(&self) -> u64 {
        self.self_loops
    }

    fn parse_line(line: &str) -> Option<(VertexId, VertexId)> {
        let mut fields = line.split_whitespace();
        let src = fields.next()?.parse().ok()?;
        let dst = fields.next()?.parse().ok()?;
        Some((src, dst))
    }
}

impl<R: Read> Iterator for EdgeParser<R> {
    type Item = Result<Edge, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
                continue;
            }

            match Self::parse_line(trimmed) {
                Some((src, dst)) if src == dst => {
                    self.self_loops += 1;
                    continue;
                }
                Some((src, dst)) => return Some(Ok(Edge::new(src, dst))),
                None => {
                    return Some(Err(ParseError::Malformed {
                        line: self.line_no,
                        content: trimmed.to_string(),
                    }))
                }
            }
        }
    }
}
