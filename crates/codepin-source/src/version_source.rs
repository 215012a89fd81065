use codepin_core::{is_safe_version_component, CodepinError, Config, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::HttpTransport;

/// Everything needed to fetch one release archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMetadata {
    pub version: String,
    pub download_url: String,
    /// Absent for direct version requests; the archive then installs unverified.
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// Ask the update service for the newest release of the configured
    /// platform and quality.
    Latest,
    /// Build the download URL for a known version without any network call.
    Direct { version: String },
}

#[derive(Debug, Deserialize)]
struct LatestReleaseResponse {
    name: Option<String>,
    url: Option<String>,
    sha256hash: Option<String>,
}

impl VersionSource {
    pub fn from_request(version: Option<&str>) -> Self {
        match version {
            Some(version) => Self::Direct {
                version: version.to_string(),
            },
            None => Self::Latest,
        }
    }

    pub fn resolve<T>(&self, config: &Config, transport: &T) -> Result<ReleaseMetadata>
    where
        T: HttpTransport + ?Sized,
    {
        match self {
            Self::Latest => resolve_latest(config, transport),
            Self::Direct { version } => resolve_direct(config, version),
        }
    }
}

fn resolve_latest<T>(config: &Config, transport: &T) -> Result<ReleaseMetadata>
where
    T: HttpTransport + ?Sized,
{
    let url = config.latest_url();
    info!(url = %url, "querying latest release");
    let body = transport.get_text(&url)?;
    let metadata = parse_latest_response(&url, &body)?;
    debug!(version = %metadata.version, download_url = %metadata.download_url, "latest release resolved");
    Ok(metadata)
}

pub(crate) fn parse_latest_response(url: &str, body: &str) -> Result<ReleaseMetadata> {
    let response: LatestReleaseResponse =
        serde_json::from_str(body).map_err(|err| CodepinError::InvalidResponse {
            url: url.to_string(),
            message: format!("body is not the expected JSON object: {err}"),
        })?;

    let version = required_field(url, "name", response.name)?;
    let download_url = required_field(url, "url", response.url)?;
    let sha256 = required_field(url, "sha256hash", response.sha256hash)?;

    if !is_safe_version_component(&version) {
        return Err(CodepinError::InvalidResponse {
            url: url.to_string(),
            message: format!("version name '{version}' is not usable as a directory name"),
        });
    }

    Ok(ReleaseMetadata {
        version,
        download_url,
        sha256: Some(sha256),
    })
}

fn required_field(url: &str, field: &str, value: Option<String>) -> Result<String> {
    match value.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CodepinError::InvalidResponse {
            url: url.to_string(),
            message: format!("missing required field '{field}'"),
        }),
    }
}

fn resolve_direct(config: &Config, version: &str) -> Result<ReleaseMetadata> {
    if !is_safe_version_component(version) {
        return Err(CodepinError::Config(format!(
            "version '{version}' is not usable as a directory name"
        )));
    }
    Ok(ReleaseMetadata {
        version: version.to_string(),
        download_url: config.direct_download_url(version),
        sha256: None,
    })
}
