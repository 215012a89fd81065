use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CodepinError, IoResultExt, Result};

pub const CONFIG_FILE_NAME: &str = "codepin.toml";
pub const DEFAULT_PLATFORM: &str = "win32-x64-archive";
pub const DEFAULT_UPDATE_API: &str = "https://update.code.visualstudio.com/api/update";
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://update.code.visualstudio.com";
pub const DEFAULT_EXECUTABLE_NAME: &str = "Code.exe";
pub const DEFAULT_METADATA_PATH: &str = "resources/app/package.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Stable,
    Insider,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Insider => "insider",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "stable" => Some(Self::Stable),
            "insider" | "insiders" => Some(Self::Insider),
            _ => None,
        }
    }
}

/// Values supplied on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub platform: Option<String>,
    pub quality: Option<Quality>,
}

/// Immutable run configuration, built once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    pub platform: String,
    pub quality: Quality,
    pub update_api: String,
    pub download_base: String,
    pub executable_name: String,
    pub metadata_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    platform: Option<String>,
    quality: Option<String>,
    update_api: Option<String>,
    download_base: Option<String>,
    executable_name: Option<String>,
    metadata_path: Option<String>,
}

impl Config {
    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            platform: DEFAULT_PLATFORM.to_string(),
            quality: Quality::Stable,
            update_api: DEFAULT_UPDATE_API.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            executable_name: DEFAULT_EXECUTABLE_NAME.to_string(),
            metadata_path: DEFAULT_METADATA_PATH.to_string(),
        }
    }

    /// Builds the configuration for `root`: defaults, then `codepin.toml`
    /// from the root when present, then `overrides`.
    pub fn load(root: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let root = std::path::absolute(root).io_context(|| {
            format!("failed to resolve workspace root: {}", root.display())
        })?;
        let mut config = Self::with_defaults(root);

        let config_path = config.root.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .io_context(|| format!("failed to read config: {}", config_path.display()))?;
            config.apply_file(&raw, &config_path)?;
        }

        if let Some(platform) = &overrides.platform {
            config.platform = platform.clone();
        }
        if let Some(quality) = overrides.quality {
            config.quality = quality;
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, raw: &str, path: &Path) -> Result<()> {
        let file: FileConfig = toml::from_str(raw).map_err(|err| {
            CodepinError::Config(format!("failed to parse {}: {err}", path.display()))
        })?;

        if let Some(platform) = file.platform {
            self.platform = platform;
        }
        if let Some(quality) = file.quality {
            self.quality = Quality::parse(&quality).ok_or_else(|| {
                CodepinError::Config(format!(
                    "unsupported quality '{quality}' in {}; expected stable or insider",
                    path.display()
                ))
            })?;
        }
        if let Some(update_api) = file.update_api {
            self.update_api = update_api;
        }
        if let Some(download_base) = file.download_base {
            self.download_base = download_base;
        }
        if let Some(executable_name) = file.executable_name {
            self.executable_name = executable_name;
        }
        if let Some(metadata_path) = file.metadata_path {
            self.metadata_path = metadata_path;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.platform.trim().is_empty() || self.platform.contains('/') {
            return Err(CodepinError::Config(format!(
                "invalid platform '{}'",
                self.platform
            )));
        }
        for (name, value) in [
            ("update_api", &self.update_api),
            ("download_base", &self.download_base),
        ] {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(CodepinError::Config(format!(
                    "{name} must be an http(s) URL, got '{value}'"
                )));
            }
        }
        if self.executable_name.trim().is_empty() {
            return Err(CodepinError::Config(
                "executable_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn latest_url(&self) -> String {
        format!(
            "{}/{}/{}/latest",
            self.update_api.trim_end_matches('/'),
            self.platform,
            self.quality.as_str()
        )
    }

    pub fn direct_download_url(&self, version: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.download_base.trim_end_matches('/'),
            version,
            self.platform,
            self.quality.as_str()
        )
    }
}
