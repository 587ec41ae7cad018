//! ffdeps command line tool
//!
//! Locates and installs the ffmpeg binaries using the local host.

mod cli;

use anyhow::Result;
use clap::Parser;
use ffdeps_core::{Dependency, LocalHost, Provisioner, Settings};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ffdeps=debug".parse()?)
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting ffdeps v{}", ffdeps_core::VERSION);

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(dir) = cli.data_dir {
        settings.data_dir = Some(dir);
    }
    if let Some(dir) = cli.tmp_dir {
        settings.tmp_dir = Some(dir);
    }

    let host = LocalHost::from_settings(&settings);
    let provisioner = Provisioner::detect()?.with_throttle_window(settings.throttle_window());

    match cli.command {
        Commands::Load { dependency } => {
            let path = provisioner.load(dependency, &host).await?;
            println!("{}", path.display());
        }
        Commands::Install { target } => {
            for dependency in target.dependencies() {
                provisioner.install(dependency, &host).await?;
            }
        }
        Commands::Ensure { dependency } => {
            let path = provisioner.ensure(dependency, &host).await?;
            println!("{}", path.display());
        }
        Commands::Status => {
            for (dependency, result) in provisioner.status(&host).await {
                match result {
                    Ok(path) => println!("{:<8} {}", dependency.as_str(), path.display()),
                    Err(e) => println!("{:<8} unavailable: {}", dependency.as_str(), first_line(&e)),
                }
            }
        }
        Commands::Instructions { dependency } => print_instructions(dependency),
    }

    Ok(())
}

fn print_instructions(dependency: Dependency) {
    match dependency.instructions() {
        Some(text) => println!("{}", text),
        None => println!("{} is installed automatically, no manual steps needed.", dependency),
    }
}

fn first_line(err: &impl std::fmt::Display) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}
