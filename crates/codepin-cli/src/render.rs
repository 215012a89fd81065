#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputStyle {
    Plain,
    Rich,
}

fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Copy, Clone, Debug)]
struct TerminalRenderer {
    style: OutputStyle,
}

struct DownloadProgress {
    style: OutputStyle,
    written: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalRenderer {
    fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    fn style(self) -> OutputStyle {
        self.style
    }

    fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    /// The bar is created lazily on the first chunk so cache hits and
    /// short-circuited runs print nothing.
    fn start_download_progress(self) -> DownloadProgress {
        DownloadProgress {
            style: self.style,
            written: 0,
            progress_bar: None,
            started_at: Instant::now(),
        }
    }
}

impl DownloadProgress {
    fn set(&mut self, written: u64, total: Option<u64>) {
        self.written = written;
        if self.style == OutputStyle::Plain {
            return;
        }

        let progress_bar = self.progress_bar.get_or_insert_with(|| {
            let progress_bar = ProgressBar::new(total.unwrap_or(0).max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<9} [{bar:24.cyan/blue}] {bytes:>10}/{total_bytes:10} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.progress_chars("=>-"));
            }
            progress_bar.set_message("download");
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            progress_bar
        });
        if let Some(total) = total {
            progress_bar.set_length(total.max(1));
        }
        progress_bar.set_position(written);
    }

    fn finish(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };
        progress_bar.finish_and_clear();
        println!(
            "{} {} in {}",
            colorize(progress_label_style(), "download"),
            HumanBytes(self.written),
            format_elapsed(self.started_at.elapsed())
        );
    }

    fn abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.abandon();
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "error" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

fn format_update_outcome_lines(outcome: &UpdateOutcome, style: OutputStyle) -> Vec<String> {
    let report = match outcome {
        UpdateOutcome::AlreadyCurrent { version } => {
            return vec![render_status_line(
                style,
                "info",
                &format!("already on {version}; nothing to do"),
            )];
        }
        UpdateOutcome::Switched(report) => report,
    };

    let mut lines = Vec::new();
    match &report.install {
        InstallStep::RebuildOnly => {}
        InstallStep::AlreadyPresent => lines.push(render_status_line(
            style,
            "info",
            &format!("{} already installed", report.version),
        )),
        InstallStep::Installed {
            download,
            verified,
            is_new,
        } => {
            let action = if *is_new { "installed" } else { "reused" };
            lines.push(render_status_line(
                style,
                "ok",
                &format!("{action} {} (archive: {})", report.version, download.as_str()),
            ));
            if !verified {
                lines.push(render_status_line(
                    style,
                    "warn",
                    "archive was not checksum-verified",
                ));
            }
        }
    }

    lines.push(render_status_line(
        style,
        "info",
        &format!("exported {} extension id(s)", report.exported_extensions),
    ));
    match &report.backup {
        Some(path) => lines.push(render_status_line(
            style,
            "ok",
            &format!("backed up data to {}", path.display()),
        )),
        None => lines.push(render_status_line(style, "info", "no data to back up")),
    }

    if let Some(outcomes) = &report.restored {
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|outcome| !outcome.succeeded())
            .map(|outcome| outcome.id.as_str())
            .collect();
        lines.push(render_status_line(
            style,
            if failed.is_empty() { "ok" } else { "warn" },
            &format!(
                "reinstalled {}/{} extension(s)",
                outcomes.len() - failed.len(),
                outcomes.len()
            ),
        ));
        if !failed.is_empty() {
            lines.push(render_status_line(
                style,
                "warn",
                &format!("failed: {}", failed.join(", ")),
            ));
        }
    }

    let switched = match report.previous.as_deref() {
        Some(previous) if previous != report.version => {
            format!("current version {previous} -> {}", report.version)
        }
        _ => format!("current version {}", report.version),
    };
    lines.push(render_status_line(style, "ok", &switched));
    lines
}
