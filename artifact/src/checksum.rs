//! SHA-256 sidecar files in `sha256sum` format.

use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{ArtifactError, Result};

/// Computes the SHA-256 hex digest of a file.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Path of the sidecar for an artifact: `index.db.gz` → `index.db.gz.sha256`.
pub fn checksum_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Writes `<hex>  <file name>\n` next to the artifact.
///
/// Returns the sidecar path and the digest.
pub fn write_checksum(artifact: &Path) -> Result<(PathBuf, String)> {
    let digest = sha256_file(artifact)?;
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar = checksum_path(artifact);
    std::fs::write(&sidecar, format!("{digest}  {name}\n"))?;
    Ok((sidecar, digest))
}

/// Checks an artifact against its sidecar.
///
/// # Errors
///
/// Returns [`ArtifactError::InvalidChecksum`] when the sidecar is malformed
/// or the digest differs.
pub fn verify_checksum(artifact: &Path) -> Result<()> {
    let sidecar = checksum_path(artifact);
    let line = std::fs::read_to_string(&sidecar)?;
    let expected = line
        .split_whitespace()
        .next()
        .filter(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| {
            ArtifactError::InvalidChecksum(format!("malformed sidecar {}", sidecar.display()))
        })?;

    let actual = sha256_file(artifact)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(ArtifactError::InvalidChecksum(format!(
            "{}: expected {expected}, got {actual}",
            artifact.display()
        )));
    }
    Ok(())
}
