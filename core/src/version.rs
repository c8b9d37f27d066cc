//! Declared package versions.
//!
//! A [`Version`] keeps the full string exactly as declared. Only
//! [`Version::display`] strips epoch, build and architecture suffixes; the
//! canonical value is never rewritten. An absent or blank declaration is
//! represented as `None`, never as an empty version.

use serde::{Deserialize, Serialize};

/// Architecture names recognized as trailing version suffixes.
const ARCH_SUFFIXES: &[&str] = &[
    "amd64", "arm64", "armhf", "i386", "ppc64el", "riscv64", "s390x",
];

/// A Debian-style version string: `[epoch:]upstream[-revision]`.
///
/// # Examples
///
/// ```
/// use slice_index_core::Version;
///
/// let v = Version::parse("1:2.38-4ubuntu2+build1").unwrap();
/// assert_eq!(v.as_str(), "1:2.38-4ubuntu2+build1");
/// assert_eq!(v.epoch(), Some(1));
/// assert_eq!(v.upstream(), "2.38");
/// assert_eq!(v.revision(), Some("4ubuntu2+build1"));
/// assert_eq!(v.display(), "2.38-4ubuntu2");
///
/// assert!(Version::parse("   ").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Parses a declared version, returning `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The canonical, full version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric epoch, when present.
    pub fn epoch(&self) -> Option<u32> {
        let (epoch, _) = self.0.split_once(':')?;
        epoch.parse().ok()
    }

    fn without_epoch(&self) -> &str {
        match self.0.split_once(':') {
            Some((epoch, rest)) if epoch.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => &self.0,
        }
    }

    /// Upstream part (no epoch, no revision).
    pub fn upstream(&self) -> &str {
        let rest = self.without_epoch();
        match rest.rsplit_once('-') {
            Some((upstream, _)) => upstream,
            None => rest,
        }
    }

    /// Debian revision, when present.
    pub fn revision(&self) -> Option<&str> {
        self.without_epoch()
            .rsplit_once('-')
            .map(|(_, revision)| revision)
    }

    /// Display form: epoch, `+buildN` and trailing architecture suffixes removed.
    pub fn display(&self) -> String {
        let mut out = self.without_epoch().to_string();
        loop {
            let before = out.len();
            strip_arch_suffix(&mut out);
            strip_build_suffix(&mut out);
            if out.len() == before {
                break;
            }
        }
        if out.is_empty() {
            self.0.clone()
        } else {
            out
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_build_suffix(out: &mut String) {
    if let Some(idx) = out.rfind("+build") {
        let tail = &out[idx + "+build".len()..];
        if tail.chars().all(|c| c.is_ascii_digit()) {
            out.truncate(idx);
        }
    }
}

fn strip_arch_suffix(out: &mut String) {
    for arch in ARCH_SUFFIXES {
        for sep in [':', '~', '+', '.'] {
            let suffix = format!("{sep}{arch}");
            if out.ends_with(&suffix) {
                let len = out.len() - suffix.len();
                out.truncate(len);
                return;
            }
        }
    }
}

/// Resolves the effective version of a definition from its scopes.
///
/// The most specific declaration wins: a slice-level `version:` overrides the
/// package-level one. When several slices declare a version, the slice whose
/// name sorts first provides it, which keeps the choice independent of
/// document order. Returns `None` when no scope declares anything.
///
/// # Examples
///
/// ```
/// use slice_index_core::resolve_version;
///
/// let v = resolve_version(Some("1.0"), [("libs", Some("1.1")), ("bins", None)]);
/// assert_eq!(v.unwrap().as_str(), "1.1");
///
/// assert!(resolve_version(None, [("bins", None::<&str>)]).is_none());
/// ```
pub fn resolve_version<'a, I, S>(package_level: Option<&str>, slice_levels: I) -> Option<Version>
where
    I: IntoIterator<Item = (&'a str, Option<S>)>,
    S: AsRef<str>,
{
    let most_specific = slice_levels
        .into_iter()
        .filter_map(|(name, version)| {
            version
                .as_ref()
                .and_then(|v| Version::parse(v.as_ref()))
                .map(|v| (name, v))
        })
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, version)| version);

    most_specific.or_else(|| package_level.and_then(Version::parse))
}
