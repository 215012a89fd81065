use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Dir,
    File,
}

/// One row of the workspace path table, relative to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub key: &'static str,
    pub relative: &'static str,
    pub kind: PathKind,
}

impl LayoutEntry {
    const fn dir(key: &'static str, relative: &'static str) -> Self {
        Self {
            key,
            relative,
            kind: PathKind::Dir,
        }
    }

    const fn file(key: &'static str, relative: &'static str) -> Self {
        Self {
            key,
            relative,
            kind: PathKind::File,
        }
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.relative.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

const VERSIONS: LayoutEntry = LayoutEntry::dir("versions", "versions");
const DATA: LayoutEntry = LayoutEntry::dir("data", "data");
const CURRENT_DATA: LayoutEntry = LayoutEntry::dir("current-data", "data/current");
const USER_DATA: LayoutEntry = LayoutEntry::dir("user-data", "data/current/user-data");
const EXTENSIONS: LayoutEntry = LayoutEntry::dir("extensions", "data/current/extensions");
const BACKUPS: LayoutEntry = LayoutEntry::dir("backups", "data/backups");
const DOWNLOADS: LayoutEntry = LayoutEntry::dir("downloads", "_downloads");
const TMP: LayoutEntry = LayoutEntry::dir("tmp", "_tmp");
const POINTER: LayoutEntry = LayoutEntry::file("pointer", "current.txt");
const EXTENSION_LIST: LayoutEntry =
    LayoutEntry::file("extension-list", "data/current/extension-list.txt");

pub const LAYOUT_ENTRIES: &[LayoutEntry] = &[
    VERSIONS,
    DATA,
    CURRENT_DATA,
    USER_DATA,
    EXTENSIONS,
    BACKUPS,
    DOWNLOADS,
    TMP,
    POINTER,
    EXTENSION_LIST,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        VERSIONS.resolve(&self.root)
    }

    pub fn data_dir(&self) -> PathBuf {
        DATA.resolve(&self.root)
    }

    pub fn current_data_dir(&self) -> PathBuf {
        CURRENT_DATA.resolve(&self.root)
    }

    pub fn user_data_dir(&self) -> PathBuf {
        USER_DATA.resolve(&self.root)
    }

    pub fn extensions_dir(&self) -> PathBuf {
        EXTENSIONS.resolve(&self.root)
    }

    pub fn backups_dir(&self) -> PathBuf {
        BACKUPS.resolve(&self.root)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        DOWNLOADS.resolve(&self.root)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        TMP.resolve(&self.root)
    }

    pub fn pointer_path(&self) -> PathBuf {
        POINTER.resolve(&self.root)
    }

    pub fn extension_list_path(&self) -> PathBuf {
        EXTENSION_LIST.resolve(&self.root)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    pub fn executable_path(&self, version: &str, executable_name: &str) -> PathBuf {
        self.version_dir(version).join(executable_name)
    }

    pub fn cached_archive_path(&self, version: &str) -> PathBuf {
        self.downloads_dir().join(cached_archive_file_name(version))
    }

    /// Every table row resolved against the root, in declaration order.
    pub fn path_table(&self) -> Vec<(LayoutEntry, PathBuf)> {
        LAYOUT_ENTRIES
            .iter()
            .map(|entry| (*entry, entry.resolve(&self.root)))
            .collect()
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for (entry, dir) in self.path_table() {
            if entry.kind != PathKind::Dir {
                continue;
            }
            fs::create_dir_all(&dir)
                .io_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Cache entries are keyed by the resolved version id, never by a moving
/// tag such as "latest".
pub fn cached_archive_file_name(version: &str) -> String {
    format!("vscode-{version}.zip")
}

/// True when `value` can name a directory under `versions/` without
/// escaping it or colliding with hidden staging entries.
pub fn is_safe_version_component(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
}
