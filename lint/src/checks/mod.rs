//! Built-in checks, one module per concern.

mod blank_lines;
mod comments;
mod copyright;
mod double_glob;
mod sorting;
mod version_pin;

pub use blank_lines::ExcessBlankLines;
pub use comments::{ARCH_SIGNATURES, ArchitectureComment, LargeComment};
pub use copyright::MissingCopyright;
pub use double_glob::DoubleGlob;
pub use sorting::UnsortedContent;
pub use version_pin::FixedMinorVersion;

#[cfg(test)]
pub(crate) fn input_for(raw: &str) -> (slice_index_core::SliceDefinition, String) {
    let parsed = slice_index_core::parse_sdf(raw).expect("fixture must parse");
    (parsed.definition, raw.to_string())
}
