use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use codepin_core::{CodepinError, IoResultExt, Result};
use tracing::{debug, info, warn};

use crate::fs_utils::{copy_dir_recursive, dir_has_entries, remove_dir_if_exists};

/// Subdirectories of the current data tree whose contents warrant a snapshot.
pub const TRACKED_DATA_DIRS: [&str; 2] = ["user-data", "extensions"];

const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Copies the whole current data tree into a new timestamped snapshot.
///
/// Returns `None` without touching `backups_dir` when none of the tracked
/// subdirectories has any entry, which is the first-run case.
pub fn backup_current_data(
    current_data_dir: &Path,
    backups_dir: &Path,
) -> Result<Option<PathBuf>> {
    let has_data = TRACKED_DATA_DIRS
        .iter()
        .any(|name| dir_has_entries(&current_data_dir.join(name)));
    if !has_data {
        debug!(dir = %current_data_dir.display(), "no user data to back up");
        return Ok(None);
    }

    fs::create_dir_all(backups_dir)
        .io_context(|| format!("failed to create {}", backups_dir.display()))?;

    let timestamp = chrono::Local::now()
        .format(SNAPSHOT_TIMESTAMP_FORMAT)
        .to_string();
    let mut snapshot = backups_dir.join(&timestamp);
    let mut suffix = 2;
    while snapshot.exists() {
        snapshot = backups_dir.join(format!("{timestamp}-{suffix}"));
        suffix += 1;
    }

    copy_dir_recursive(current_data_dir, &snapshot)?;
    info!(snapshot = %snapshot.display(), "backed up current data");
    Ok(Some(snapshot))
}

/// Strips a trailing version suffix from an extension folder name.
///
/// The suffix starts at the first `-` followed by an ASCII digit, so
/// `ms-python.python-2025.1.0` becomes `ms-python.python`. Names without
/// such a boundary are kept verbatim.
pub fn derive_extension_id(folder_name: &str) -> &str {
    let bytes = folder_name.as_bytes();
    let boundary = bytes
        .windows(2)
        .position(|pair| pair[0] == b'-' && pair[1].is_ascii_digit());
    match boundary {
        Some(index) if index > 0 => &folder_name[..index],
        _ => folder_name,
    }
}

/// Writes the sorted, de-duplicated extension ids found in
/// `extensions_dir` to `output_file`, one per line without a final newline.
pub fn export_extension_list(extensions_dir: &Path, output_file: &Path) -> Result<Vec<String>> {
    let mut ids = BTreeSet::new();
    if extensions_dir.exists() {
        for entry in fs::read_dir(extensions_dir)
            .io_context(|| format!("failed to read {}", extensions_dir.display()))?
        {
            let entry =
                entry.io_context(|| format!("failed to read {}", extensions_dir.display()))?;
            let file_type = entry
                .file_type()
                .io_context(|| format!("failed to stat {}", entry.path().display()))?;
            if !file_type.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping extension folder with non UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            ids.insert(derive_extension_id(&name).to_string());
        }
    } else {
        debug!(dir = %extensions_dir.display(), "extensions dir missing; exporting empty list");
    }

    let ids: Vec<String> = ids.into_iter().collect();
    if let Some(parent) = output_file.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(output_file, ids.join("\n"))
        .io_context(|| format!("failed to write extension list: {}", output_file.display()))?;
    info!(count = ids.len(), path = %output_file.display(), "exported extension list");
    Ok(ids)
}

/// Result of one extension-installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInstallOutcome {
    pub id: String,
    /// `None` when the process could not be started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ExtensionInstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn failure(&self) -> Option<CodepinError> {
        if self.succeeded() {
            return None;
        }
        let status = match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "no exit code".to_string(),
        };
        let message = if self.stderr.is_empty() {
            status
        } else {
            format!("{status}: {}", self.stderr)
        };
        Some(CodepinError::Subprocess {
            id: self.id.clone(),
            message,
        })
    }
}

/// Empties `extensions_dir` and installs every id listed in `list_file`
/// through the editor's own CLI, one blocking call per id.
///
/// Per-extension failures are recorded in the returned outcomes and never
/// abort the batch. A missing list file is refused up front.
pub fn restore_extensions_with_runner<RunCommand>(
    executable: &Path,
    list_file: &Path,
    user_data_dir: &Path,
    extensions_dir: &Path,
    mut run: RunCommand,
) -> Result<Vec<ExtensionInstallOutcome>>
where
    RunCommand: FnMut(&mut Command) -> io::Result<Output>,
{
    let listing = match fs::read_to_string(list_file) {
        Ok(listing) => listing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CodepinError::io(
                format!(
                    "extension list {} does not exist; refusing to rebuild extensions",
                    list_file.display()
                ),
                err,
            ))
        }
        Err(err) => {
            return Err(CodepinError::io(
                format!("failed to read extension list: {}", list_file.display()),
                err,
            ))
        }
    };

    remove_dir_if_exists(extensions_dir)
        .io_context(|| format!("failed to clear {}", extensions_dir.display()))?;
    fs::create_dir_all(extensions_dir)
        .io_context(|| format!("failed to create {}", extensions_dir.display()))?;

    let mut outcomes = Vec::new();
    for id in listing.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut command =
            build_install_extension_command(executable, id, user_data_dir, extensions_dir);
        let outcome = match run(&mut command) {
            Ok(output) => ExtensionInstallOutcome {
                id: id.to_string(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
            Err(err) => ExtensionInstallOutcome {
                id: id.to_string(),
                exit_code: None,
                stderr: err.to_string(),
            },
        };

        match outcome.failure() {
            None => info!(id, "extension installed"),
            Some(err) => warn!("{err}"),
        }
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

pub(crate) fn build_install_extension_command(
    executable: &Path,
    id: &str,
    user_data_dir: &Path,
    extensions_dir: &Path,
) -> Command {
    let mut command = Command::new(executable);
    command
        .arg("--install-extension")
        .arg(id)
        .arg("--user-data-dir")
        .arg(user_data_dir)
        .arg("--extensions-dir")
        .arg(extensions_dir);
    command
}
