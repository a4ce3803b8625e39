use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use xcpatch_rs::config;
use xcpatch_rs::{PatchOutcome, ProfileBuilder, ProfileName};

#[derive(Debug, Parser)]
#[command(
    name = "xcpatch",
    version,
    about = "Apply Swift build settings to a prepared Cordova iOS platform."
)]
struct Cli {
    /// Cordova project root containing config.xml (default: current directory).
    #[arg(default_value = ".", env = "CORDOVA_PROJECT_ROOT")]
    project_root: PathBuf,

    /// Built-in settings table to start from (current, legacy).
    #[arg(long, env = "XCPATCH_PROFILE")]
    profile: Option<ProfileName>,

    /// Config file (default: <project_root>/xcpatch.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    if let Err(e) = real_main() {
        error!("{:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// Warnings and errors go to stderr, everything else to stdout.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .init();
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let patch_config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_or_default(&cli.project_root)?,
    };

    let base = cli.profile.or(patch_config.profile).unwrap_or_default();
    let profile = ProfileBuilder::from_profile(base)
        .config(patch_config)
        .build()
        .context("building the settings profile")?;

    info!("running the iosrtc build-setting patch ({base:?} profile)");

    match xcpatch_rs::patch(&cli.project_root, &profile)? {
        PatchOutcome::Patched(report) => {
            info!(
                "patched {} ({} build configurations)",
                report.project.name, report.configurations
            );
        }
        PatchOutcome::Aborted { .. } => {}
    }
    Ok(())
}
