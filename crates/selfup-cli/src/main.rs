mod confirm;
mod interrupt;
mod preflight;
mod render;
mod update_flow;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use selfup_core::{resolve_install_root, UpdateConfig};
use selfup_installer::{InstallLayout, ScriptInstaller};
use selfup_source::{GitHubRevisionCounter, GitSourceFetcher};
use tracing_subscriber::EnvFilter;

use crate::confirm::CountdownConfirmation;
use crate::interrupt::{install_handler, InterruptGate};
use crate::preflight::SystemPreflight;
use crate::render::TerminalRenderer;
use crate::update_flow::{Collaborators, UpdateOutcome, Updater};

const LOG_ENV_VAR: &str = "SELFUP_LOG";

static INTERRUPTS: InterruptGate = InterruptGate::new();

#[derive(Parser, Debug)]
#[command(name = "selfup", version)]
#[command(
    about = "Updates the installation in place, keeping configuration, database and media",
    long_about = None
)]
struct Cli {}

fn main() -> ExitCode {
    let _cli = Cli::parse();
    init_tracing();

    let renderer = TerminalRenderer::current();
    if let Err(err) = install_handler(&INTERRUPTS, renderer) {
        renderer.print_status("error", &format!("{err:#}"));
        return ExitCode::from(1);
    }
    match run(renderer) {
        Ok(code) => code,
        Err(err) => {
            renderer.print_status("error", &format!("{err:#}"));
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(renderer: TerminalRenderer) -> Result<ExitCode> {
    let install_root = resolve_install_root()?;
    let config = UpdateConfig::load(&install_root)?;
    let layout = InstallLayout::from_config(install_root, &config);
    tracing::info!(root = %layout.root().display(), "starting update");

    renderer.print_section("selfup: in-place update");
    renderer.print_status("info", &format!("installation: {}", layout.root().display()));
    renderer.print_status("info", &format!("source: {}", config.repository_url));

    let preflight = SystemPreflight::from_config(&config);
    let confirmation = CountdownConfirmation::new(config.countdown_secs, renderer);
    let fetcher = GitSourceFetcher::from_config(&config);
    let installer = ScriptInstaller::from_config(&config);
    let revisions = GitHubRevisionCounter::from_config(&config);
    let updater = Updater::new(
        &layout,
        &config,
        Collaborators {
            preflight: &preflight,
            confirmation: &confirmation,
            fetcher: &fetcher,
            installer: &installer,
            revisions: &revisions,
            interrupts: &INTERRUPTS,
        },
        renderer,
    );

    match updater.run() {
        Ok(outcome) => {
            renderer.print_section("Update complete");
            renderer.print_lines(&format_outcome_lines(&outcome, renderer));
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            renderer.print_section("Update failed");
            for (status, message) in failure.report_lines() {
                renderer.print_status(status, &message);
            }
            Ok(ExitCode::from(1))
        }
    }
}

fn format_outcome_lines(outcome: &UpdateOutcome, renderer: TerminalRenderer) -> Vec<String> {
    let style = renderer.style();
    let mut lines = vec![render::render_status_line(
        style,
        "ok",
        &format!(
            "dependencies: {}{}",
            outcome.classification.as_str(),
            if outcome.installer_ran {
                " (reinstalled)"
            } else {
                ""
            }
        ),
    )];
    if let Some(total) = outcome.total_revisions {
        lines.push(render::render_status_line(
            style,
            "ok",
            &format!("upstream revisions recorded: {total}"),
        ));
    }
    if outcome.backup_removed {
        lines.push(render::render_status_line(
            style,
            "ok",
            &format!("temporary backup {} removed", outcome.snapshot_id),
        ));
    }
    if !outcome.warnings.is_empty() {
        lines.push(render::render_status_line(
            style,
            "warn",
            &format!("{} warning(s) raised during the update", outcome.warnings.len()),
        ));
    }
    lines.push(render::render_status_line(
        style,
        "info",
        "start the application with: npm start",
    ));
    lines
}
