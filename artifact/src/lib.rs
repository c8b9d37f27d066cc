//! Publishing format of a slice index snapshot.
//!
//! The SQLite file is compressed with gzip ([`compress_file`]) and shipped
//! with a `sha256sum`-style sidecar ([`write_checksum`]). [`decompress`] is
//! the exact inverse of [`compress`] and is what a consumer runs before
//! opening the database.

mod checksum;
mod compress;
mod error;

pub use checksum::{checksum_path, sha256_file, verify_checksum, write_checksum};
pub use compress::{
    ARTIFACT_EXTENSION, ArtifactReport, artifact_path, compress, compress_file, decompress,
    decompress_file,
};
pub use error::{ArtifactError, Result};
