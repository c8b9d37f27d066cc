//! Slice definition file (SDF) parsing.
//!
//! Parsing is independent per file. A file that is not valid YAML, or whose
//! root is not a mapping, does not abort anything: [`Definition::from_bytes`]
//! turns it into a definition with no document, no version and a single
//! `parse-error` warning, so it renders as "missing" downstream.

use std::collections::HashMap;

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::{
    ArchiveInfo, ContentEntry, ContentRule, Definition, Finding, PARSE_ERROR_CODE, Slice,
    SliceDefinition, is_glob_pattern,
};
use crate::version::{Version, resolve_version};

/// Number of hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 12;

/// Keys of a content entry that modify it rather than select its rule.
const ENTRY_MODIFIERS: &[&str] = &["arch", "mode", "until", "mutable"];

/// Reasons a slice definition file cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Bytes are not UTF-8.
    #[error("file is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Malformed YAML syntax.
    #[error("invalid YAML: {message}")]
    Syntax {
        message: String,
        /// 1-based line of the error, when the parser reports one.
        line: Option<usize>,
    },

    /// The document root is not a mapping.
    #[error("document root must be a mapping")]
    NotAMapping,

    /// The document parsed but has no JSON representation.
    #[error("document cannot be represented as JSON: {0}")]
    Json(String),

    /// The file could not be read from the repository.
    #[error("unreadable file: {0}")]
    Unreadable(String),
}

impl ParseError {
    fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } => *line,
            _ => None,
        }
    }
}

/// Successful parse of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSdf {
    /// The document converted to JSON.
    pub document: serde_json::Value,
    /// Structured view used by the lint checks.
    pub definition: SliceDefinition,
    /// Resolved declared version.
    pub version: Option<Version>,
}

/// Returns the package key for a repository path: the file name minus extension.
///
/// # Examples
///
/// ```
/// use slice_index_core::package_key;
///
/// assert_eq!(package_key("slices/libc6.yaml").as_deref(), Some("libc6"));
/// assert_eq!(package_key("slices/python3.12.yaml").as_deref(), Some("python3.12"));
/// ```
pub fn package_key(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Computes the short content fingerprint of raw file bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..FINGERPRINT_LEN].to_string()
}

/// Parses the text of one slice definition file.
///
/// # Errors
///
/// Returns [`ParseError::Syntax`] for malformed YAML,
/// [`ParseError::NotAMapping`] when the root is not a mapping, and
/// [`ParseError::Json`] when the document has no JSON representation.
///
/// # Examples
///
/// ```
/// use slice_index_core::parse_sdf;
///
/// let parsed = parse_sdf("package: hello\nslices:\n  bins:\n    contents:\n      /usr/bin/hello:\n").unwrap();
/// assert_eq!(parsed.definition.package.as_deref(), Some("hello"));
/// assert_eq!(parsed.definition.slices[0].contents[0].path, "/usr/bin/hello");
/// assert!(parsed.version.is_none());
/// ```
pub fn parse_sdf(text: &str) -> Result<ParsedSdf, ParseError> {
    let mut value: Value = serde_yaml::from_str(text).map_err(|e| ParseError::Syntax {
        message: e.to_string(),
        line: e.location().map(|loc| loc.line()),
    })?;
    value.apply_merge().map_err(|e| ParseError::Syntax {
        message: e.to_string(),
        line: None,
    })?;

    let Value::Mapping(root) = &value else {
        return Err(ParseError::NotAMapping);
    };

    let document = serde_json::to_value(&value).map_err(|e| ParseError::Json(e.to_string()))?;
    let definition = read_definition(root, &version_source_texts(text));
    let version = resolve_version(
        definition.version.as_deref(),
        definition
            .slices
            .iter()
            .map(|slice| (slice.name.as_str(), slice.version.as_deref())),
    );

    Ok(ParsedSdf {
        document,
        definition,
        version,
    })
}

impl Definition {
    /// Builds the definition for one file from its raw bytes.
    ///
    /// Parse failures are contained: the returned definition has no document
    /// and no version, and carries a single `parse-error` warning.
    pub fn from_bytes(branch: &str, path: &str, bytes: &[u8]) -> Self {
        let fingerprint = fingerprint(bytes);
        let package = package_key(path).unwrap_or_else(|| path.to_string());

        let (raw, parsed) = match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), parse_sdf(text)),
            Err(e) => (
                String::from_utf8_lossy(bytes).into_owned(),
                Err(ParseError::InvalidUtf8(e.to_string())),
            ),
        };

        match parsed {
            Ok(parsed) => Self {
                package,
                branch: branch.to_string(),
                path: path.to_string(),
                raw,
                document: Some(parsed.document),
                parsed: Some(parsed.definition),
                version: parsed.version,
                findings: Vec::new(),
                fingerprint,
                archive: ArchiveInfo::default(),
            },
            Err(error) => Self::failed(package, branch, path, raw, fingerprint, &error),
        }
    }

    /// Builds the definition for a file whose content could not be read.
    pub fn unreadable(branch: &str, path: &str, error: impl std::fmt::Display) -> Self {
        let package = package_key(path).unwrap_or_else(|| path.to_string());
        let error = ParseError::Unreadable(error.to_string());
        Self::failed(package, branch, path, String::new(), fingerprint(b""), &error)
    }

    fn failed(
        package: String,
        branch: &str,
        path: &str,
        raw: String,
        fingerprint: String,
        error: &ParseError,
    ) -> Self {
        let mut finding = Finding::warning(PARSE_ERROR_CODE).with_text(error.to_string());
        if let Some(line) = error.line() {
            finding = finding.with_line(line);
        }
        Self {
            package,
            branch: branch.to_string(),
            path: path.to_string(),
            raw,
            document: None,
            parsed: None,
            version: None,
            findings: vec![finding],
            fingerprint,
            archive: ArchiveInfo::default(),
        }
    }
}

/// Source text of block-style `version:` values, keyed by slice name
/// (`None` for the package level).
type VersionTexts = HashMap<Option<String>, String>;

fn read_definition(root: &Mapping, versions: &VersionTexts) -> SliceDefinition {
    let slices = match root.get("slices") {
        Some(Value::Mapping(slices)) => slices
            .iter()
            .filter_map(|(name, body)| Some(read_slice(scalar_string(name)?, body, versions)))
            .collect(),
        _ => Vec::new(),
    };

    SliceDefinition {
        package: root.get("package").and_then(scalar_string),
        archive: root.get("archive").and_then(scalar_string),
        version: root
            .get("version")
            .and_then(|value| version_value(value, versions.get(&None))),
        essential: root.get("essential").map(string_list).unwrap_or_default(),
        slices,
    }
}

fn read_slice(name: String, body: &Value, versions: &VersionTexts) -> Slice {
    let Value::Mapping(body) = body else {
        return Slice {
            name,
            ..Slice::default()
        };
    };

    let contents = match body.get("contents") {
        Some(Value::Mapping(contents)) => contents
            .iter()
            .filter_map(|(path, spec)| Some(read_entry(scalar_string(path)?, spec)))
            .collect(),
        _ => Vec::new(),
    };

    Slice {
        essential: body.get("essential").map(string_list).unwrap_or_default(),
        contents,
        mutate: body.get("mutate").and_then(scalar_string),
        version: body
            .get("version")
            .and_then(|value| version_value(value, versions.get(&Some(name.clone())))),
        name,
    }
}

fn read_entry(path: String, spec: &Value) -> ContentEntry {
    let default_rule = if is_glob_pattern(&path) {
        ContentRule::Glob
    } else {
        ContentRule::Extract
    };

    let Value::Mapping(spec) = spec else {
        let rule = match spec {
            Value::Null => default_rule,
            other => ContentRule::Unknown {
                raw: serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
            },
        };
        return ContentEntry {
            path,
            rule,
            arch: Vec::new(),
            mode: None,
            until: None,
            mutable: false,
        };
    };

    let rule = entry_rule(spec).unwrap_or(default_rule);

    ContentEntry {
        path,
        rule,
        arch: spec.get("arch").map(string_list).unwrap_or_default(),
        mode: spec.get("mode").and_then(file_mode),
        until: spec.get("until").and_then(scalar_string),
        mutable: spec.get("mutable").and_then(Value::as_bool).unwrap_or(false),
    }
}

/// Selects the rule of a mapping-valued entry; `None` means "extract".
fn entry_rule(spec: &Mapping) -> Option<ContentRule> {
    if let Some(from) = spec.get("copy").and_then(scalar_string) {
        return Some(ContentRule::Copy { from });
    }
    if let Some(text) = spec.get("text").and_then(scalar_string) {
        return Some(ContentRule::Text { text });
    }
    if let Some(target) = spec.get("symlink").and_then(scalar_string) {
        return Some(ContentRule::Symlink { target });
    }
    if spec.get("make").and_then(Value::as_bool) == Some(true) {
        return Some(ContentRule::Dir);
    }
    if let Some(kind) = spec.get("generate").and_then(scalar_string) {
        return Some(ContentRule::Generate { kind });
    }

    let has_unknown_key = spec.keys().any(|key| {
        scalar_string(key).is_none_or(|key| !ENTRY_MODIFIERS.contains(&key.as_str()))
    });
    if has_unknown_key {
        let raw = serde_json::to_value(Value::Mapping(spec.clone()))
            .unwrap_or(serde_json::Value::Null);
        return Some(ContentRule::Unknown { raw });
    }
    None
}

/// Reads a file mode. Leading-zero literals such as `0644` arrive as strings
/// and are read as octal.
fn file_mode(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Value::String(s) => {
            let digits = s.strip_prefix("0o").unwrap_or(s);
            u32::from_str_radix(digits, 8).ok()
        }
        _ => None,
    }
}

/// Reads a declared version without reformatting it.
///
/// YAML reads an unquoted `1.10` as the float `1.1`, so numeric values are
/// taken from the source text. A numeric version whose text cannot be
/// located (flow-style mappings) is treated as undeclared.
fn version_value(value: &Value, source: Option<&String>) -> Option<String> {
    match value {
        Value::Number(_) => source.filter(|text| !text.is_empty()).cloned(),
        other => scalar_string(other),
    }
}

/// Collects the literal text of block-style `version:` keys at package level
/// and directly inside each slice.
fn version_source_texts(raw: &str) -> VersionTexts {
    let mut texts = VersionTexts::new();
    let mut in_slices = false;
    let mut slice: Option<(usize, String)> = None;
    let mut body_indent: Option<usize> = None;

    for line in raw.lines() {
        let content = line.trim_start_matches(' ');
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let indent = line.len() - content.len();
        let Some((key, value)) = content.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches(|c| c == '"' || c == '\'');

        if indent == 0 {
            in_slices = key == "slices";
            slice = None;
            if key == "version" {
                texts.insert(None, scalar_text(value));
            }
            continue;
        }
        if !in_slices {
            continue;
        }

        let nested = matches!(&slice, Some((slice_indent, _)) if indent > *slice_indent);
        if !nested {
            slice = Some((indent, key.to_string()));
            body_indent = None;
            continue;
        }
        let body = *body_indent.get_or_insert(indent);
        if indent == body && key == "version" {
            if let Some((_, name)) = &slice {
                texts.insert(Some(name.clone()), scalar_text(value));
            }
        }
    }
    texts
}

/// Value text after `key:`, without a trailing comment or quotes.
fn scalar_text(value: &str) -> String {
    let value = value.split_once(" #").map_or(value, |(text, _)| text).trim();
    value.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a list of names given either as a sequence or as mapping keys.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_string).collect(),
        Value::Mapping(map) => map.keys().filter_map(scalar_string).collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}
