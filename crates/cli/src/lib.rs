pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use procura_core::config::{AppConfig, LoadOptions, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Procura procurement workflow CLI",
    long_about = "Inspect configuration, check backend readiness, and evaluate entitlement, approval permissions, quotations and bid readiness against JSON snapshots.",
    after_help = "Examples:\n  procura doctor --json\n  procura matrix\n  procura quotes rfq.json\n  procura pending --user-id u-1 --role Manager --department Operations"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, backend credential and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the role-permission matrix for audit")]
    Matrix,
    #[command(about = "Resolve entitlement and sign-in routing for a user snapshot")]
    Entitlement { snapshot: PathBuf },
    #[command(about = "List the actions a user may take on each approval item in a snapshot")]
    Actions { snapshot: PathBuf },
    #[command(about = "Evaluate the quotes of an RFQ and flag the lowest price")]
    Quotes { rfq: PathBuf },
    #[command(about = "Check whether a bid draft is ready to submit")]
    BidReadiness { bid: PathBuf },
    #[command(about = "Fetch the signed-in user's pending approvals from the backend")]
    Pending {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        department: Option<String>,
        #[arg(long, default_value = "")]
        email: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Matrix => commands::matrix::run(),
        Command::Entitlement { snapshot } => commands::entitlement::run(&snapshot),
        Command::Actions { snapshot } => commands::actions::run(&snapshot),
        Command::Quotes { rfq } => commands::quotes::run(&rfq),
        Command::BidReadiness { bid } => commands::bid_readiness::run(&bid),
        Command::Pending { user_id, role, department, email } => {
            commands::pending::run(commands::pending::PendingArgs {
                user_id,
                role,
                department,
                email,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command payloads on stdout stay parseable.
pub fn init_logging(config: &LoggingConfig) {
    use procura_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}
