//! Gzip compression of the snapshot database.
//!
//! The gzip header carries no file name and a zero modification time, so the
//! same database always compresses to the same bytes.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use tracing::info;

use crate::checksum::write_checksum;
use crate::error::{ArtifactError, Result};

/// Suffix appended to the database path for the compressed artifact.
pub const ARTIFACT_EXTENSION: &str = "gz";

/// Compresses bytes in memory.
///
/// # Examples
///
/// ```
/// use slice_index_artifact::{compress, decompress};
///
/// let data = b"SQLite format 3\0".repeat(64);
/// let packed = compress(&data).unwrap();
/// assert!(packed.len() < data.len());
/// assert_eq!(decompress(&packed).unwrap(), data);
/// ```
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::with_capacity(bytes.len() / 2), Compression::best());
    encoder.write_all(bytes)?;
    encoder
        .finish()
        .map_err(|e| ArtifactError::CompressionError(e.to_string()))
}

/// Exact inverse of [`compress`].
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ArtifactError::CompressionError(e.to_string()))?;
    Ok(out)
}

/// Paths and sizes of a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub path: PathBuf,
    pub checksum_path: PathBuf,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// SHA-256 of the compressed file, lowercase hex.
    pub sha256: String,
}

impl ArtifactReport {
    /// Compressed size as a fraction of the input size.
    pub fn ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        self.output_bytes as f64 / self.input_bytes as f64
    }
}

/// Path of the artifact for a database: `index.db` → `index.db.gz`.
pub fn artifact_path(database: &Path) -> PathBuf {
    let mut name = database.as_os_str().to_owned();
    name.push(".");
    name.push(ARTIFACT_EXTENSION);
    PathBuf::from(name)
}

/// Compresses `database` to `<database>.gz` and writes its checksum sidecar.
///
/// # Errors
///
/// Returns [`ArtifactError::OutputExists`] when the artifact exists and
/// `overwrite` is false.
pub fn compress_file(database: &Path, overwrite: bool) -> Result<ArtifactReport> {
    let started = Instant::now();
    let output = artifact_path(database);
    if output.exists() && !overwrite {
        return Err(ArtifactError::OutputExists(output));
    }

    let input_bytes = std::fs::metadata(database)?.len();
    if let Err(err) = write_gzip(database, &output) {
        let _ = std::fs::remove_file(&output);
        return Err(err);
    }

    let output_bytes = std::fs::metadata(&output)?.len();
    let (checksum_path, sha256) = write_checksum(&output)?;

    let report = ArtifactReport {
        path: output,
        checksum_path,
        input_bytes,
        output_bytes,
        sha256,
    };
    info!(
        path = %report.path.display(),
        input_bytes,
        output_bytes,
        ratio = report.ratio(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "compressed snapshot"
    );
    Ok(report)
}

fn write_gzip(database: &Path, output: &Path) -> Result<()> {
    let mut reader = BufReader::new(File::open(database)?);
    let writer = BufWriter::new(File::create(output)?);
    let mut encoder = GzBuilder::new().mtime(0).write(writer, Compression::best());
    std::io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder
        .finish()
        .map_err(|e| ArtifactError::CompressionError(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Decompresses an artifact file to `destination`.
pub fn decompress_file(artifact: &Path, destination: &Path) -> Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(artifact)?));
    let mut writer = BufWriter::new(File::create(destination)?);
    let written = std::io::copy(&mut decoder, &mut writer)
        .map_err(|e| ArtifactError::CompressionError(e.to_string()))?;
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_appends_extension() {
        assert_eq!(
            artifact_path(Path::new("out/index.db")),
            PathBuf::from("out/index.db.gz")
        );
    }

    #[test]
    fn test_compression_is_deterministic() {
        let data = b"package: foo\n".repeat(100);
        assert_eq!(compress(&data).unwrap(), compress(&data).unwrap());
    }

    #[test]
    fn test_header_has_no_timestamp() {
        let packed = compress(b"abc").unwrap();
        // Bytes 4..8 of a gzip member hold MTIME.
        assert_eq!(&packed[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let err = decompress(b"definitely not gzip").unwrap_err();
        assert!(matches!(err, ArtifactError::CompressionError(_)));
    }

    #[test]
    fn test_empty_input_round_trips() {
        assert!(decompress(&compress(&[]).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_failed_compression_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        // A directory opens fine but fails on the first read.
        let database = dir.path().join("index.db");
        std::fs::create_dir(&database).unwrap();

        assert!(compress_file(&database, false).is_err());
        assert!(!artifact_path(&database).exists());
        assert!(!crate::checksum::checksum_path(&artifact_path(&database)).exists());
    }

    #[test]
    fn test_ratio_of_empty_input() {
        let report = ArtifactReport {
            path: PathBuf::new(),
            checksum_path: PathBuf::new(),
            input_bytes: 0,
            output_bytes: 20,
            sha256: String::new(),
        };
        assert_eq!(report.ratio(), 0.0);
    }
}
