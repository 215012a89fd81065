fn run_cli(cli: Cli) -> Result<()> {
    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "codepin", &mut std::io::stdout());
        return Ok(());
    }

    let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let config = Config::load(&root, &cli.overrides())
        .with_context(|| format!("failed to load configuration for {}", root.display()))?;
    let layout = WorkspaceLayout::new(&config.root);
    let renderer = TerminalRenderer::current();

    if cli.paths {
        renderer.print_lines(&format_path_table_lines(&layout));
        return Ok(());
    }

    if cli.list {
        let current = read_current_version(&layout.pointer_path())?;
        let installed = list_installed_versions(&layout.versions_dir())?;
        renderer.print_lines(&format_installed_lines(
            &installed
                .iter()
                .map(|entry| entry.version.clone())
                .collect::<Vec<_>>(),
            current.as_deref(),
        ));
        return Ok(());
    }

    let request = UpdateRequest {
        version: cli.target_version.clone(),
        rebuild: cli.rebuild,
    };
    info!(
        root = %config.root.display(),
        platform = %config.platform,
        quality = config.quality.as_str(),
        "starting update"
    );

    let transport = ReqwestTransport::new()?;
    let mut progress = renderer.start_download_progress();
    let result = run_update(
        &config,
        &layout,
        &transport,
        &request,
        &mut |written, total| progress.set(written, total),
        |command| command.output(),
    );
    match &result {
        Ok(_) => progress.finish(),
        Err(_) => progress.abandon(),
    }

    let outcome = result?;
    renderer.print_lines(&format_update_outcome_lines(&outcome, renderer.style()));
    Ok(())
}

fn format_path_table_lines(layout: &WorkspaceLayout) -> Vec<String> {
    let rows = layout.path_table();
    let width = rows
        .iter()
        .map(|(entry, _)| entry.key.len())
        .max()
        .unwrap_or(0);
    let mut lines = vec![format!("{:<width$}  {}", "root", layout.root().display())];
    for (entry, path) in rows {
        let marker = match entry.kind {
            PathKind::Dir => "/",
            PathKind::File => "",
        };
        lines.push(format!("{:<width$}  {}{marker}", entry.key, path.display()));
    }
    lines
}

fn format_installed_lines(installed: &[String], current: Option<&str>) -> Vec<String> {
    if installed.is_empty() {
        return vec!["no versions installed".to_string()];
    }
    installed
        .iter()
        .map(|version| {
            if Some(version.as_str()) == current {
                format!("* {version}")
            } else {
                format!("  {version}")
            }
        })
        .collect()
}
