use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use codepin_core::{CodepinError, Config, ConfigOverrides, PathKind, Quality, WorkspaceLayout};
use codepin_installer::{
    backup_current_data, export_extension_list, install_package, is_version_installed,
    list_installed_versions, read_current_version, restore_extensions_with_runner,
    write_current_version, ExtensionInstallOutcome, InstallSpec,
};
use codepin_security::verify_sha256_file;
use codepin_source::{fetch_package, FetchStatus, HttpTransport, ReqwestTransport, VersionSource};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

include!("dispatch.rs");
include!("update_flow.rs");
include!("render.rs");
include!("tests.rs");

#[derive(Parser, Debug)]
#[command(name = "codepin")]
#[command(
    about = "Portable, version-pinned editor installs with protected user data",
    long_about = None
)]
struct Cli {
    /// Workspace root holding versions/, data/ and current.txt.
    #[arg(long, env = "CODEPIN_ROOT")]
    root: Option<PathBuf>,

    /// Vendor platform id, for example win32-x64-archive.
    #[arg(long)]
    platform: Option<String>,

    #[arg(long, value_enum)]
    quality: Option<QualityArg>,

    /// Install and switch to this exact version instead of the latest one.
    #[arg(long = "version", value_name = "X.Y.Z", value_parser = parse_version_arg)]
    target_version: Option<String>,

    /// Reinstall extensions from the exported list. Without --version this
    /// only rebuilds against the current version.
    #[arg(long)]
    rebuild: bool,

    /// Print the resolved workspace paths and exit.
    #[arg(long, conflicts_with_all = ["list", "completions", "rebuild", "target_version"])]
    paths: bool,

    /// List installed versions and exit.
    #[arg(long, conflicts_with_all = ["completions", "rebuild", "target_version"])]
    list: bool,

    /// Print a shell completion script and exit.
    #[arg(long, value_name = "SHELL", conflicts_with_all = ["rebuild", "target_version"])]
    completions: Option<Shell>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum QualityArg {
    Stable,
    Insider,
}

impl From<QualityArg> for Quality {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Stable => Quality::Stable,
            QualityArg::Insider => Quality::Insider,
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            platform: self.platform.clone(),
            quality: self.quality.map(Quality::from),
        }
    }
}

fn parse_version_arg(value: &str) -> std::result::Result<String, String> {
    let trimmed = value.trim();
    semver::Version::parse(trimmed)
        .map(|_| trimmed.to_string())
        .map_err(|err| format!("'{value}' is not a version like 1.107.1: {err}"))
}

/// Category of the typed failure behind `err`, if there is one.
fn failure_kind(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<CodepinError>().map(|err| err.kind().as_str())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match failure_kind(&err) {
                Some(kind) => error!(kind, "{err:#}"),
                None => error!("{err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
