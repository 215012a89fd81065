use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodepinError>;

/// Failure categories surfaced by the update pipeline.
///
/// Every kind except [`ErrorKind::Subprocess`] aborts a run. Subprocess
/// failures are recorded per extension and the batch continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Network,
    InvalidResponse,
    Integrity,
    Extraction,
    Metadata,
    IncompleteInstall,
    Io,
    Subprocess,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Network => "network",
            Self::InvalidResponse => "invalid-response",
            Self::Integrity => "integrity",
            Self::Extraction => "extraction",
            Self::Metadata => "metadata",
            Self::IncompleteInstall => "incomplete-install",
            Self::Io => "io",
            Self::Subprocess => "subprocess",
        }
    }

    pub fn is_fatal(self) -> bool {
        self != Self::Subprocess
    }
}

#[derive(Debug, Error)]
pub enum CodepinError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("invalid update service response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("sha256 mismatch: expected {expected}, actual {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("archive is not a readable zip container: {}", path.display())]
    CorruptArchive { path: PathBuf },

    #[error("failed to extract {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    #[error("package metadata not found: {}", path.display())]
    MetadataMissing { path: PathBuf },

    #[error("package metadata {} has no '{field}' field", path.display())]
    MetadataFieldMissing { path: PathBuf, field: &'static str },

    #[error("package metadata {} could not be parsed: {message}", path.display())]
    MetadataUnparsable { path: PathBuf, message: String },

    #[error("incomplete install at {}: missing {executable}", path.display())]
    IncompleteInstall { path: PathBuf, executable: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("extension '{id}' failed to install: {message}")]
    Subprocess { id: String, message: String },
}

impl CodepinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Network { .. } => ErrorKind::Network,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::ChecksumMismatch { .. } | Self::CorruptArchive { .. } => ErrorKind::Integrity,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::MetadataMissing { .. }
            | Self::MetadataFieldMissing { .. }
            | Self::MetadataUnparsable { .. } => ErrorKind::Metadata,
            Self::IncompleteInstall { .. } => ErrorKind::IncompleteInstall,
            Self::Io { .. } => ErrorKind::Io,
            Self::Subprocess { .. } => ErrorKind::Subprocess,
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Attaches a human-readable context message to `std::io` failures.
pub trait IoResultExt<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| CodepinError::io(context(), source))
    }
}
