mod data;
mod fs_utils;
mod package;
mod pointer;
mod versions;

pub use data::{
    backup_current_data, derive_extension_id, export_extension_list,
    restore_extensions_with_runner, ExtensionInstallOutcome, TRACKED_DATA_DIRS,
};
pub use fs_utils::{copy_dir_recursive, unique_token};
pub use package::{install_package, InstallSpec, InstalledPackage};
pub use pointer::{read_current_version, write_current_version};
pub use versions::{is_version_installed, list_installed_versions, InstalledVersion};

#[cfg(test)]
mod tests;
