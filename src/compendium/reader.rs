//! Streaming NDJSON reader producing [`EquivalenceClass`] records.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::compendium::model::{EquivalenceClass, RecordError, parse_record};
use crate::error::CompendiumError;

pub(crate) fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>, CompendiumError> {
    let file = File::open(path).map_err(|e| CompendiumError::Open {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufReader::new(file).lines())
}

/// Lazy, single-pass reader over one compendium file.
///
/// Blank lines are skipped. The first malformed line yields an error; callers
/// abort the file there, since a partially ingested file would go unnoticed.
/// Open a fresh reader to read the file again.
pub struct CompendiumReader<R> {
    path: String,
    lines: Lines<R>,
    line: usize,
    failed: bool,
}

impl CompendiumReader<BufReader<File>> {
    /// Open a compendium file for streaming.
    pub fn open(path: &Path) -> Result<Self, CompendiumError> {
        Ok(Self::new(path.display().to_string(), open_lines(path)?))
    }
}

impl<R: BufRead> CompendiumReader<R> {
    /// Wrap any line source; `path` is only used in error messages.
    pub fn from_reader(path: impl Into<String>, reader: R) -> Self {
        Self::new(path.into(), reader.lines())
    }

    fn new(path: String, lines: Lines<R>) -> Self {
        Self {
            path,
            lines,
            line: 0,
            failed: false,
        }
    }

    /// 1-based number of the last line read.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<R: BufRead> Iterator for CompendiumReader<R> {
    type Item = Result<EquivalenceClass, CompendiumError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let raw = self.lines.next()?;
            self.line += 1;
            let text = match raw {
                Ok(text) => text,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(CompendiumError::Read {
                        path: self.path.clone(),
                        line: self.line,
                        source: e,
                    }));
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            let parsed = parse_record(&text).map_err(|err| {
                self.failed = true;
                match err {
                    RecordError::Json(message) => CompendiumError::Parse {
                        path: self.path.clone(),
                        line: self.line,
                        message,
                    },
                    RecordError::Schema(message) => CompendiumError::Schema {
                        path: self.path.clone(),
                        line: self.line,
                        message,
                    },
                }
            });
            return Some(parsed);
        }
    }
}
