use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use codepin_core::{is_safe_version_component, CodepinError, Config, IoResultExt, Result};
use tracing::{debug, info};

use crate::fs_utils::{move_dir_or_copy, remove_dir_if_exists, unique_token};

/// Where an extracted package keeps its identity and what proves it can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    pub executable_name: String,
    pub metadata_path: String,
}

impl InstallSpec {
    pub fn from_config(config: &Config) -> Self {
        Self {
            executable_name: config.executable_name.clone(),
            metadata_path: config.metadata_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub version: String,
    pub path: PathBuf,
    /// False when the version directory already existed and nothing changed.
    pub is_new: bool,
}

/// Extracts `archive_path` under `tmp_dir` and installs it as
/// `versions_dir/<version>`, where the version comes from the package
/// metadata rather than the archive name.
pub fn install_package(
    archive_path: &Path,
    versions_dir: &Path,
    tmp_dir: &Path,
    spec: &InstallSpec,
) -> Result<InstalledPackage> {
    let extract_dir = tmp_dir.join(format!("extract_{}", unique_token()));
    fs::create_dir_all(&extract_dir)
        .io_context(|| format!("failed to create {}", extract_dir.display()))?;

    let result = install_from_extract_dir(archive_path, &extract_dir, versions_dir, spec);
    let _ = remove_dir_if_exists(&extract_dir);
    result
}

fn install_from_extract_dir(
    archive_path: &Path,
    extract_dir: &Path,
    versions_dir: &Path,
    spec: &InstallSpec,
) -> Result<InstalledPackage> {
    extract_zip(archive_path, extract_dir)?;
    let effective_root = effective_root(extract_dir)?;
    let version = read_package_version(&effective_root, &spec.metadata_path)?;

    let destination = versions_dir.join(&version);
    if destination.exists() {
        info!(version = %version, path = %destination.display(), "version already installed");
        return Ok(InstalledPackage {
            version,
            path: destination,
            is_new: false,
        });
    }

    let staging = versions_dir.join(format!(".staging-{version}-{}", unique_token()));
    move_dir_or_copy(&effective_root, &staging)?;

    if !staging.join(&spec.executable_name).is_file() {
        let _ = remove_dir_if_exists(&staging);
        return Err(CodepinError::IncompleteInstall {
            path: destination,
            executable: spec.executable_name.clone(),
        });
    }

    if let Err(err) = fs::rename(&staging, &destination) {
        let _ = remove_dir_if_exists(&staging);
        return Err(CodepinError::io(
            format!("failed to commit install to {}", destination.display()),
            err,
        ));
    }

    info!(version = %version, path = %destination.display(), "installed new version");
    Ok(InstalledPackage {
        version,
        path: destination,
        is_new: true,
    })
}

fn extract_zip(archive_path: &Path, dst: &Path) -> Result<()> {
    let extraction_error = |message: String| CodepinError::Extraction {
        path: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path)
        .io_context(|| format!("failed to open archive {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| extraction_error(err.to_string()))?;
    debug!(entries = archive.len(), dst = %dst.display(), "extracting archive");
    archive
        .extract(dst)
        .map_err(|err| extraction_error(err.to_string()))
}

/// A single top-level directory is treated as a wrapper and unwrapped.
pub(crate) fn effective_root(extract_dir: &Path) -> Result<PathBuf> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(extract_dir)
        .io_context(|| format!("failed to read {}", extract_dir.display()))?
    {
        let entry = entry.io_context(|| format!("failed to read {}", extract_dir.display()))?;
        entries.push(entry.path());
    }

    if let [only] = entries.as_slice() {
        if only.is_dir() {
            return Ok(only.clone());
        }
    }
    Ok(extract_dir.to_path_buf())
}

pub(crate) fn read_package_version(root: &Path, metadata_path: &str) -> Result<String> {
    let path = metadata_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment));

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CodepinError::MetadataMissing { path })
        }
        Err(err) => {
            return Err(CodepinError::io(
                format!("failed to read {}", path.display()),
                err,
            ))
        }
    };

    let document: serde_json::Value =
        serde_json::from_str(&raw).map_err(|err| CodepinError::MetadataUnparsable {
            path: path.clone(),
            message: err.to_string(),
        })?;

    let Some(value) = document.get("version") else {
        return Err(CodepinError::MetadataFieldMissing {
            path,
            field: "version",
        });
    };
    let Some(version) = value.as_str().map(str::trim) else {
        return Err(CodepinError::MetadataUnparsable {
            path,
            message: format!("'version' must be a string, got {value}"),
        });
    };
    if !is_safe_version_component(version) {
        return Err(CodepinError::MetadataUnparsable {
            path,
            message: format!("'version' value '{version}' is not usable as a directory name"),
        });
    }
    Ok(version.to_string())
}
