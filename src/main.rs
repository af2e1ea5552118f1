use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rootplane::ClusterArgs;
use rootplane::config::Settings;
use rootplane::host::SystemHost;
use rootplane::pki;
use rootplane::report::ConsoleStatus;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Provision the cluster CA and API server certificate
    Certs(Box<ClusterArgs>),
    /// Check existing PKI material against the current configuration
    Verify(Box<ClusterArgs>),
}

fn main() {
    if let Err(err) = run() {
        eprintln!("rootplane error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Certs(args) => {
            let settings = load_settings(&args)?;
            let mut status = ConsoleStatus;
            pki::provision_control_plane(&settings, &SystemHost, &mut status)?;
        }
        CliCommand::Verify(args) => {
            let settings = load_settings(&args)?;
            pki::verify_control_plane(&settings, &SystemHost)?;
            println!("[certs] existing PKI material satisfies the current configuration");
        }
    }
    Ok(())
}

fn load_settings(args: &ClusterArgs) -> Result<Settings> {
    let mut settings =
        Settings::new(args.config.clone()).context("Failed to load configuration")?;
    settings.merge_with_args(args);
    settings.validate()?;
    Ok(settings)
}
