use std::sync::LazyLock;

use regex::Regex;
use slice_index_core::{Finding, Severity};

use crate::{Check, CheckInput, Result, line_containing};

/// Shared objects pinned past the soname (`libfoo.so.1.2`) and paths carrying
/// a full `x.y.z` release number.
static PINNED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.so\.\d+\.\d+|\d+\.\d+\.\d+").expect("static regex must compile")
});

/// Declared versions carrying a full `x.y.z` release number.
static EXACT_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("static regex must compile"));

/// Flags content paths and declared versions pinned to an exact minor or
/// patch version.
///
/// Such pins break on every point release; a prefix glob such as
/// `libfoo.so.1*` or a `major.minor` version survives them.
pub struct FixedMinorVersion;

impl Check for FixedMinorVersion {
    fn code(&self) -> &'static str {
        "fixed-minor-version"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        let definition = input.definition;
        let mut findings = Vec::new();

        let pinned = definition
            .content_entries()
            .map(|(_, entry)| entry.path.as_str())
            .find(|path| PINNED_RE.is_match(path));
        if let Some(path) = pinned {
            let mut finding = self.finding().with_text(path.to_string());
            if let Some(line) = line_containing(input.raw, path) {
                finding = finding.with_line(line);
            }
            findings.push(finding);
        }

        let declared = std::iter::once((None, definition.version.as_deref())).chain(
            definition
                .slices
                .iter()
                .map(|slice| (Some(slice.name.as_str()), slice.version.as_deref())),
        );
        for (slice, version) in declared {
            let Some(version) = version.filter(|v| EXACT_VERSION_RE.is_match(v)) else {
                continue;
            };
            let text = match slice {
                Some(name) => format!("slice {name} version {version}"),
                None => format!("version {version}"),
            };
            let mut finding = self.finding().with_text(text);
            if let Some(line) = version_line(input.raw, version) {
                finding = finding.with_line(line);
            }
            findings.push(finding);
        }

        Ok(findings)
    }
}

/// 1-based line of the `version:` key declaring `value`.
fn version_line(raw: &str, value: &str) -> Option<usize> {
    raw.lines()
        .position(|line| {
            line.trim_start()
                .strip_prefix("version")
                .and_then(|rest| rest.trim_start().strip_prefix(':'))
                .is_some_and(|rest| rest.contains(value))
        })
        .map(|idx| idx + 1)
}
