use slice_index_core::{Finding, Severity};

use crate::{Check, CheckInput, Result};

/// Flags definitions that ship no copyright file.
///
/// Convention is a dedicated `copyright` slice; a content entry ending in
/// `/copyright` in any slice is accepted as well.
pub struct MissingCopyright;

impl Check for MissingCopyright {
    fn code(&self) -> &'static str {
        "missing-copyright"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn run(&self, input: &CheckInput<'_>) -> Result<Vec<Finding>> {
        let definition = input.definition;
        let has_slice = definition.find_slice("copyright").is_some();
        let has_file = definition
            .content_entries()
            .any(|(_, entry)| entry.path.ends_with("/copyright"));

        if has_slice || has_file {
            Ok(Vec::new())
        } else {
            Ok(vec![self.finding()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::input_for;

    fn run(raw: &str) -> Vec<Finding> {
        let (definition, raw) = input_for(raw);
        MissingCopyright
            .run(&CheckInput {
                definition: &definition,
                raw: &raw,
            })
            .unwrap()
    }

    #[test]
    fn test_copyright_slice_accepted() {
        let raw = concat!(
            "package: foo\n",
            "slices:\n",
            "  copyright:\n",
            "    contents:\n",
            "      /usr/share/doc/foo/copyright:\n",
        );
        assert!(run(raw).is_empty());
    }

    #[test]
    fn test_copyright_path_in_other_slice_accepted() {
        let raw = concat!(
            "package: foo\n",
            "slices:\n",
            "  bins:\n",
            "    contents:\n",
            "      /usr/bin/foo:\n",
            "      /usr/share/doc/foo/copyright:\n",
        );
        assert!(run(raw).is_empty());
    }

    #[test]
    fn test_missing_copyright() {
        let raw = "package: foo\nslices:\n  bins:\n    contents:\n      /usr/bin/foo:\n";
        let findings = run(raw);
        assert_eq!(findings, vec![Finding::warning("missing-copyright")]);
    }
}
