#[derive(Debug, Clone, PartialEq, Eq)]
struct UpdateRequest {
    version: Option<String>,
    rebuild: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InstallStep {
    /// Rebuild-only run against the version the pointer already names.
    RebuildOnly,
    /// The target directory existed, so nothing was fetched.
    AlreadyPresent,
    Installed {
        download: FetchStatus,
        verified: bool,
        is_new: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UpdateReport {
    previous: Option<String>,
    version: String,
    install: InstallStep,
    exported_extensions: usize,
    backup: Option<PathBuf>,
    restored: Option<Vec<ExtensionInstallOutcome>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum UpdateOutcome {
    AlreadyCurrent { version: String },
    Switched(UpdateReport),
}

/// Runs one update or rebuild. The pointer is written last, so any error
/// leaves the previous version active.
fn run_update<T, RunCommand>(
    config: &Config,
    layout: &WorkspaceLayout,
    transport: &T,
    request: &UpdateRequest,
    progress: &mut dyn FnMut(u64, Option<u64>),
    run_command: RunCommand,
) -> codepin_core::Result<UpdateOutcome>
where
    T: HttpTransport + ?Sized,
    RunCommand: FnMut(&mut std::process::Command) -> std::io::Result<std::process::Output>,
{
    layout.ensure_base_dirs()?;
    let previous = read_current_version(&layout.pointer_path())?;

    let (version, install) = match (&request.version, request.rebuild) {
        (None, true) => {
            let current = previous.clone().ok_or_else(|| {
                CodepinError::Config(
                    "no current version is set; install one before rebuilding extensions"
                        .to_string(),
                )
            })?;
            info!(version = %current, "rebuilding extensions for current version");
            (current, InstallStep::RebuildOnly)
        }
        (requested, rebuild) => {
            if let Some(requested) = requested {
                if !rebuild && previous.as_deref() == Some(requested.as_str()) {
                    info!(version = %requested, "already on requested version");
                    return Ok(UpdateOutcome::AlreadyCurrent {
                        version: requested.clone(),
                    });
                }
            }

            match requested {
                Some(requested) if is_version_installed(&layout.versions_dir(), requested) => {
                    info!(version = %requested, "requested version already installed");
                    (requested.clone(), InstallStep::AlreadyPresent)
                }
                _ => {
                    let release = VersionSource::from_request(requested.as_deref())
                        .resolve(config, transport)?;
                    if !rebuild && previous.as_deref() == Some(release.version.as_str()) {
                        info!(version = %release.version, "already on latest version");
                        return Ok(UpdateOutcome::AlreadyCurrent {
                            version: release.version,
                        });
                    }
                    if is_version_installed(&layout.versions_dir(), &release.version) {
                        info!(version = %release.version, "resolved version already installed");
                        (release.version, InstallStep::AlreadyPresent)
                    } else {
                        let (installed, step) = ensure_release_installed(
                            config, layout, transport, &release, progress,
                        )?;
                        // The metadata version can differ from the release name, in which
                        // case only the installed version is comparable to the pointer.
                        let unchanged = matches!(step, InstallStep::Installed { is_new: false, .. })
                            && previous.as_deref() == Some(installed.as_str());
                        if !rebuild && unchanged {
                            info!(version = %installed, "already on installed version");
                            return Ok(UpdateOutcome::AlreadyCurrent { version: installed });
                        }
                        (installed, step)
                    }
                }
            }
        }
    };

    let executable = layout.executable_path(&version, &config.executable_name);
    if !executable.is_file() {
        return Err(CodepinError::IncompleteInstall {
            path: layout.version_dir(&version),
            executable: config.executable_name.clone(),
        });
    }

    let exported =
        export_extension_list(&layout.extensions_dir(), &layout.extension_list_path())?;
    let backup = backup_current_data(&layout.current_data_dir(), &layout.backups_dir())?;

    let restored = if request.rebuild {
        let outcomes = restore_extensions_with_runner(
            &executable,
            &layout.extension_list_path(),
            &layout.user_data_dir(),
            &layout.extensions_dir(),
            run_command,
        )?;
        let failed = outcomes.iter().filter(|outcome| !outcome.succeeded()).count();
        if failed > 0 {
            warn!(failed, total = outcomes.len(), "some extensions failed to reinstall");
        }
        Some(outcomes)
    } else {
        None
    };

    write_current_version(&layout.pointer_path(), &version)?;
    info!(version = %version, previous = ?previous, "current version switched");

    Ok(UpdateOutcome::Switched(UpdateReport {
        previous,
        version,
        install,
        exported_extensions: exported.len(),
        backup,
        restored,
    }))
}

fn ensure_release_installed<T>(
    config: &Config,
    layout: &WorkspaceLayout,
    transport: &T,
    release: &codepin_source::ReleaseMetadata,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> codepin_core::Result<(String, InstallStep)>
where
    T: HttpTransport + ?Sized,
{
    let fetched = fetch_package(
        transport,
        &layout.downloads_dir(),
        &release.download_url,
        &release.version,
        progress,
    )?;

    let verified = match &release.sha256 {
        Some(expected) => {
            if let Err(err) = verify_sha256_file(&fetched.path, expected) {
                let _ = std::fs::remove_file(&fetched.path);
                return Err(err);
            }
            true
        }
        None => {
            warn!(
                version = %release.version,
                "no checksum available for this version; installing unverified"
            );
            false
        }
    };

    let installed = install_package(
        &fetched.path,
        &layout.versions_dir(),
        &layout.tmp_dir(),
        &InstallSpec::from_config(config),
    )?;
    if installed.version != release.version {
        warn!(
            requested = %release.version,
            installed = %installed.version,
            "package metadata names a different version than requested"
        );
    }

    Ok((
        installed.version,
        InstallStep::Installed {
            download: fetched.status,
            verified,
            is_new: installed.is_new,
        },
    ))
}
