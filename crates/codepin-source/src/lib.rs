mod fetcher;
mod transport;
mod version_source;

pub use fetcher::{fetch_package, is_readable_zip, FetchStatus, FetchedPackage};
pub use transport::{HttpTransport, ReqwestTransport};
pub use version_source::{ReleaseMetadata, VersionSource};
