use std::fs;
use std::path::{Path, PathBuf};

use codepin_core::{IoResultExt, Result};
use semver::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    pub version: String,
    pub path: PathBuf,
}

/// Presence check only; it says nothing about whether the copy can launch.
pub fn is_version_installed(versions_dir: &Path, version: &str) -> bool {
    versions_dir.join(version).is_dir()
}

/// Installed versions in ascending semantic-version order. Staging
/// directories and names that are not versions are skipped.
pub fn list_installed_versions(versions_dir: &Path) -> Result<Vec<InstalledVersion>> {
    if !versions_dir.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(versions_dir)
        .io_context(|| format!("failed to read {}", versions_dir.display()))?
    {
        let entry = entry.io_context(|| format!("failed to read {}", versions_dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Ok(parsed) = Version::parse(&name) else {
            continue;
        };
        found.push((
            parsed,
            InstalledVersion {
                version: name,
                path: entry.path(),
            },
        ));
    }

    found.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(found.into_iter().map(|(_, installed)| installed).collect())
}
