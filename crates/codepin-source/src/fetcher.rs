use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use codepin_core::{cached_archive_file_name, IoResultExt, Result};
use tracing::{info, warn};

use crate::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    CacheHit,
    Downloaded,
    /// A cached archive failed the container check and was replaced.
    Redownloaded,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CacheHit => "cache-hit",
            Self::Downloaded => "downloaded",
            Self::Redownloaded => "redownloaded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPackage {
    pub path: PathBuf,
    pub status: FetchStatus,
}

/// Returns the cached archive for `version`, downloading it when the cache
/// has no structurally valid zip for that version.
pub fn fetch_package<T>(
    transport: &T,
    cache_dir: &Path,
    url: &str,
    version: &str,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<FetchedPackage>
where
    T: HttpTransport + ?Sized,
{
    let cache_path = cache_dir.join(cached_archive_file_name(version));

    let mut status = FetchStatus::Downloaded;
    if cache_path.exists() {
        if is_readable_zip(&cache_path) {
            info!(path = %cache_path.display(), "reusing cached archive");
            return Ok(FetchedPackage {
                path: cache_path,
                status: FetchStatus::CacheHit,
            });
        }
        warn!(path = %cache_path.display(), "cached archive is corrupt; downloading again");
        fs::remove_file(&cache_path).io_context(|| {
            format!("failed to remove corrupt cache entry: {}", cache_path.display())
        })?;
        status = FetchStatus::Redownloaded;
    }

    fs::create_dir_all(cache_dir)
        .io_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    let part_path = cache_path.with_file_name(format!("{}.tmp", cached_archive_file_name(version)));
    info!(url, path = %cache_path.display(), "downloading archive");
    if let Err(err) = download_to(transport, url, &part_path, progress) {
        let _ = fs::remove_file(&part_path);
        return Err(err);
    }

    fs::rename(&part_path, &cache_path).io_context(|| {
        format!(
            "failed to move downloaded archive into cache: {}",
            cache_path.display()
        )
    })?;

    Ok(FetchedPackage {
        path: cache_path,
        status,
    })
}

fn download_to<T>(
    transport: &T,
    url: &str,
    part_path: &Path,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<u64>
where
    T: HttpTransport + ?Sized,
{
    let file = File::create(part_path)
        .io_context(|| format!("failed to create {}", part_path.display()))?;
    let mut writer = BufWriter::new(file);
    let written = transport.download(url, &mut writer, progress)?;
    let file = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .io_context(|| format!("failed to flush {}", part_path.display()))?;
    file.sync_all()
        .io_context(|| format!("failed to sync {}", part_path.display()))?;
    Ok(written)
}

/// Structural check only: the central directory must parse.
pub fn is_readable_zip(path: &Path) -> bool {
    File::open(path)
        .ok()
        .is_some_and(|file| zip::ZipArchive::new(file).is_ok())
}
