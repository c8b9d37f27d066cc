use slice_index_core::{Finding, Severity};

use crate::{Check, CheckInput, Result};

/// Flags runs of blank lines longer than a threshold.
pub struct ExcessBlankLines {
    max_blank: usize,
}

impl ExcessBlankLines {
    pub fn new(max_blank: usize) -> Self {
        Self { max_blank }
    }
}

impl Check for ExcessBlankLines {
    fn code(&self) -> &'static str {
        "excess-blank-lines"
    }

    fn severity(&self) -> Severity {
        Severity::Note
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        let mut blanks = 0;
        for (idx, line) in input.raw.lines().enumerate() {
            if line.trim().is_empty() {
                blanks += 1;
            } else {
                blanks = 0;
            }
            if blanks > self.max_blank {
                return Ok(vec![self.finding().with_line(idx + 1)]);
            }
        }
        Ok(Vec::new())
    }
}
