//! Line sources for the merge: open readers that validate their own sort
//! order and line structure as they drain.

use std::io::BufRead;

use anyhow::{Context, Result};
use cdxj::error::CdxError;
use cdxj::io::{input_name, open_input};

use crate::MergeInput;

/// One open merge source with lazy validation state.
pub struct Source {
    reader: Box<dyn BufRead>,
    name: String,
    line_no: u64,
    prev: Option<Vec<u8>>,
    buf: Vec<u8>,
}

impl Source {
    pub fn open(input: MergeInput) -> Result<Self> {
        let (reader, name) = match input {
            MergeInput::Stdin => (open_input(cdxj::io::STDIO)?, input_name(cdxj::io::STDIO).to_string()),
            MergeInput::Path(path) => {
                let display = path.display().to_string();
                let reader = open_input(&display)
                    .with_context(|| format!("failed to open merge input {display}"))?;
                (reader, display)
            }
        };
        Ok(Self {
            reader,
            name,
            line_no: 0,
            prev: None,
            buf: Vec::with_capacity(256),
        })
    }

    /// Reads the next line (without its newline), or `None` at EOF.
    ///
    /// # Errors
    ///
    /// - `MalformedLine` when the line lacks the two CDXJ separators.
    /// - `UnsortedInput` when the line sorts strictly below its predecessor.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .with_context(|| format!("failed to read from {}", self.name))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
            self.buf.pop();
        }
        let line = self.buf.clone();

        if line.iter().filter(|&&b| b == b' ').take(2).count() < 2 {
            return Err(CdxError::MalformedLine {
                source_name: self.name.clone(),
                line_no: self.line_no,
                reason: "expected '<surt> <timestamp> <json>'".to_string(),
            }
            .into());
        }

        if let Some(prev) = &self.prev {
            if line.as_slice() < prev.as_slice() {
                return Err(CdxError::unsorted(&self.name, self.line_no, prev, &line).into());
            }
        }
        self.prev = Some(line.clone());

        Ok(Some(line))
    }
}
