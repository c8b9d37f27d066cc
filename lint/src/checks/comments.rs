use slice_index_core::{Finding, Severity};

use crate::{Check, CheckInput, Result};

/// Substrings that mark a comment as talking about a CPU architecture.
pub const ARCH_SIGNATURES: &[&str] = &[
    "arm", "amd64", "x86", "aarch", "i386", "riscv", "ppc64", "s390x",
];

/// Flags comments that condition content on an architecture.
///
/// The format has per-entry `arch:` lists; a comment mentioning an
/// architecture usually marks a workaround around them.
pub struct ArchitectureComment;

impl Check for ArchitectureComment {
    fn code(&self) -> &'static str {
        "architecture-comment"
    }

    fn severity(&self) -> Severity {
        Severity::Note
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        for (idx, line) in input.raw.lines().enumerate() {
            let Some((_, comment)) = line.split_once('#') else {
                continue;
            };
            if let Some(arch) = ARCH_SIGNATURES.iter().find(|sig| comment.contains(*sig)) {
                let finding = self
                    .finding()
                    .with_text(format!("comment mentions {arch}"))
                    .with_line(idx + 1);
                return Ok(vec![finding]);
            }
        }
        Ok(Vec::new())
    }
}

/// Flags contiguous comment blocks longer than a threshold.
pub struct LargeComment {
    max_lines: usize,
}

impl LargeComment {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }
}

impl Check for LargeComment {
    fn code(&self) -> &'static str {
        "large-comment"
    }

    fn severity(&self) -> Severity {
        Severity::Note
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let mut block_start = 0;
        let mut block_len = 0;

        // Trailing sentinel closes a block that runs to end of file.
        for (idx, line) in input.raw.lines().chain(std::iter::once("")).enumerate() {
            if line.trim_start().starts_with('#') {
                if block_len == 0 {
                    block_start = idx + 1;
                }
                block_len += 1;
                continue;
            }
            if block_len > self.max_lines {
                findings.push(
                    self.finding()
                        .with_text(format!("{block_len} comment lines"))
                        .with_line(block_start),
                );
            }
            block_len = 0;
        }

        Ok(findings)
    }
}
