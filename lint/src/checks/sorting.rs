use slice_index_core::{Finding, Severity};

use crate::{Check, CheckInput, Result, key_line};

/// Flags content paths and essential lists that are not in lexicographic
/// order.
///
/// One finding per offending slice, plus one for the package-level
/// `essential` list.
pub struct UnsortedContent;

impl Check for UnsortedContent {
    fn code(&self) -> &'static str {
        "unsorted-content"
    }

    fn severity(&self) -> Severity {
        Severity::Note
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        let definition = input.definition;
        let mut findings = Vec::new();

        if !is_sorted(definition.essential.iter().map(String::as_str)) {
            let mut finding = self.finding().with_text("package essential list");
            if let Some(line) = key_line(input.raw, "essential") {
                finding = finding.with_line(line);
            }
            findings.push(finding);
        }

        for slice in &definition.slices {
            let paths_sorted = is_sorted(slice.contents.iter().map(|e| e.path.as_str()));
            let essential_sorted = is_sorted(slice.essential.iter().map(String::as_str));
            if paths_sorted && essential_sorted {
                continue;
            }
            let mut finding = self.finding().with_text(format!("slice {}", slice.name));
            if let Some(line) = key_line(input.raw, &slice.name) {
                finding = finding.with_line(line);
            }
            findings.push(finding);
        }

        Ok(findings)
    }
}

fn is_sorted<'a>(items: impl Iterator<Item = &'a str>) -> bool {
    let items: Vec<&str> = items.collect();
    items.windows(2).all(|pair| pair[0] <= pair[1])
}
