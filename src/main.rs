//! wsa-rotator - Rotate saved Windows Subsystem for Android profiles
//!
//! Each run stops the subsystem, activates the next profile in a persistent
//! round-robin queue, starts the subsystem again and launches one app in it.

#![allow(dead_code)] // Library-style API surface shared with the tests

mod core;
mod logging;
mod platform;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use single_instance::SingleInstance;
use tracing::{error, info};

use crate::core::{HttpHeartbeat, Rotator, RotatorError, Settings, SystemHost};
use crate::logging::RunLog;

/// Application name constant
pub const APP_NAME: &str = "wsa-rotator";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = APP_NAME, version, about = "Rotate Windows Subsystem for Android profiles")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the saved profiles
    #[arg(long, global = true)]
    profiles_dir: Option<PathBuf>,

    /// Skip the uptime monitor ping
    #[arg(long, global = true)]
    no_heartbeat: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Activate the next profile and restart the subsystem (default)
    Rotate,
    /// Show profiles, queue order and the active profile
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::resolve(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = cli.profiles_dir {
        settings.profiles_dir = Some(dir);
    }
    if cli.no_heartbeat {
        settings.heartbeat_url = None;
    }

    match cli.command.unwrap_or(Command::Rotate) {
        Command::Rotate => rotate(settings),
        Command::Status => status(&settings),
    }
}

fn rotate(settings: Settings) -> ExitCode {
    let log = RunLog::with_file(&settings.get_log_file());

    let outcome = log.run(|| {
        info!("{} v{} starting...", APP_NAME, APP_VERSION);
        let profile = run_rotation(settings)?;
        info!("Profile {} is active", profile);
        Ok(profile)
    });

    match outcome {
        Some(_) => ExitCode::SUCCESS,
        None => ExitCode::FAILURE,
    }
}

fn run_rotation(settings: Settings) -> Result<String> {
    // Two rotations must never race on the target disk image
    let instance = SingleInstance::new(APP_NAME)
        .map_err(|e| anyhow::anyhow!("Failed to create single instance lock: {}", e))?;
    if !instance.is_single() {
        return Err(RotatorError::AlreadyRunning.into());
    }

    let host = SystemHost::from_settings(&settings);
    let mut rotator =
        Rotator::new(settings, host).with_heartbeat(Box::new(HttpHeartbeat::default()));
    Ok(rotator.run()?)
}

fn status(settings: &Settings) -> ExitCode {
    RunLog::console().scope(|| match print_status(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    })
}

fn print_status(settings: &Settings) -> Result<()> {
    let rotator = Rotator::new(settings.clone(), SystemHost::from_settings(settings));
    let report = rotator.status()?;

    println!("Profile store: {}", settings.get_profiles_directory().display());

    println!("Valid profiles ({}):", report.discovery.valid.len());
    for name in &report.discovery.valid {
        println!("  {}", name);
    }

    if !report.discovery.orphans.is_empty() {
        println!("Orphaned disk images ({}):", report.discovery.orphans.len());
        for path in &report.discovery.orphans {
            println!("  {}", path.display());
        }
    }

    println!("Queue:");
    for (i, name) in report.queue.names().iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }

    println!(
        "Active profile: {}",
        report.active.as_deref().unwrap_or("(none)")
    );
    println!("Next profile: {}", report.next.as_deref().unwrap_or("(none)"));
    Ok(())
}
