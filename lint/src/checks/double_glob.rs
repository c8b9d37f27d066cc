use globset::GlobBuilder;
use slice_index_core::{ContentRule, Finding, Severity};

use crate::{Check, CheckInput, Result, line_containing};

/// Flags content globs whose coverage overlaps.
///
/// Two situations are reported: a recursive `**` pattern on an extracted path
/// (generated paths such as the chisel manifest legitimately use one), and a
/// glob that also matches another content entry of the same definition,
/// including an identical glob declared in a second slice. At most one
/// finding is emitted per definition.
pub struct DoubleGlob;

impl Check for DoubleGlob {
    fn code(&self) -> &'static str {
        "double-glob"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        let entries: Vec<_> = input
            .definition
            .content_entries()
            .filter(|(_, entry)| !matches!(entry.rule, ContentRule::Generate { .. }))
            .map(|(slice, entry)| (slice.name.as_str(), entry))
            .collect();

        if let Some((slice, entry)) = entries.iter().find(|(_, e)| e.path.contains("**")) {
            let mut finding = self
                .finding()
                .with_text(format!("recursive glob {} in slice {slice}", entry.path));
            if let Some(line) = line_containing(input.raw, &entry.path) {
                finding = finding.with_line(line);
            }
            return Ok(vec![finding]);
        }

        for (idx, (slice, entry)) in entries.iter().enumerate() {
            if !entry.rule.is_glob() {
                continue;
            }
            let matcher = GlobBuilder::new(&entry.path)
                .literal_separator(true)
                .build()?
                .compile_matcher();

            let overlap = entries
                .iter()
                .enumerate()
                .find(|(other_idx, (_, other))| *other_idx != idx && matcher.is_match(&other.path));

            if let Some((_, (other_slice, other))) = overlap {
                let mut finding = self.finding().with_text(format!(
                    "{} in slice {slice} also covers {} in slice {other_slice}",
                    entry.path, other.path
                ));
                if let Some(line) = line_containing(input.raw, &entry.path) {
                    finding = finding.with_line(line);
                }
                return Ok(vec![finding]);
            }
        }

        Ok(Vec::new())
    }
}
