use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use codepin_core::{CodepinError, IoResultExt, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_reader_hex<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).io_context(|| format!("failed to open {}", path.display()))?;
    sha256_reader_hex(&mut file).io_context(|| format!("failed to hash {}", path.display()))
}

/// Compares the file digest with `expected`, ignoring hex case and
/// surrounding whitespace.
pub fn verify_sha256_file(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file_hex(path)?;
    let expected = expected.trim();
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(CodepinError::ChecksumMismatch {
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }
    debug!(path = %path.display(), sha256 = %actual, "checksum verified");
    Ok(())
}
