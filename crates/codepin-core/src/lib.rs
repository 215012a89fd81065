mod config;
mod error;
mod layout;

pub use config::{
    Config, ConfigOverrides, Quality, CONFIG_FILE_NAME, DEFAULT_DOWNLOAD_BASE,
    DEFAULT_EXECUTABLE_NAME, DEFAULT_METADATA_PATH, DEFAULT_PLATFORM, DEFAULT_UPDATE_API,
};
pub use error::{CodepinError, ErrorKind, IoResultExt, Result};
pub use layout::{
    cached_archive_file_name, is_safe_version_component, LayoutEntry, PathKind, WorkspaceLayout,
    LAYOUT_ENTRIES,
};
