use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use codepin_core::{CodepinError, IoResultExt, Result};

/// Reads the active version id. A missing, empty or whitespace-only
/// pointer means the workspace has not been initialised yet. A leading
/// UTF-8 byte order mark is ignored.
pub fn read_current_version(pointer_path: &Path) -> Result<Option<String>> {
    let raw = match fs::read_to_string(pointer_path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(CodepinError::io(
                format!("failed to read pointer: {}", pointer_path.display()),
                err,
            ))
        }
    };

    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw.as_str());
    let first_line = raw.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return Ok(None);
    }
    Ok(Some(first_line.to_string()))
}

/// Replaces the pointer through a sibling temp file. The rename is the only
/// commit point, so readers see either the old or the new value.
pub fn write_current_version(pointer_path: &Path, version: &str) -> Result<()> {
    if let Some(parent) = pointer_path.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("failed to create pointer dir: {}", parent.display()))?;
    }

    let tmp_path = pointer_path.with_file_name(format!(
        "{}.tmp",
        pointer_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("current.txt")
    ));

    let written = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(version.as_bytes())?;
            file.sync_all()
        })
        .io_context(|| format!("failed to write pointer: {}", tmp_path.display()));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    fs::rename(&tmp_path, pointer_path)
        .io_context(|| format!("failed to commit pointer: {}", pointer_path.display()))
}
