//! Command-line frontend for the LAW registry client
//!
//! Runs the registry core against an in-process ledger seeded from the
//! configuration file, either for one command or as an interactive shell.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use law_app::{AppCore, LocalConnector, StaticWallet};
use law_core::{Address, SigningIdentity};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod shell;

use config::CliConfig;
use shell::{Command, Shell};

#[derive(Parser)]
#[command(name = "law")]
#[command(about = "LAW token registry client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Address to sign with (defaults to the ledger owner)
    #[arg(long = "as", global = true, value_name = "ADDRESS")]
    signer: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell (default)
    Shell,
    /// List registered users
    Users,
    /// Register a user with an initial allocation
    Register {
        username: String,
        address: String,
        amount: String,
    },
    /// Redeem tokens held by the signer
    Redeem { amount: String },
    /// Mint tokens to a user
    Reward { username: String, amount: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load(cli.config.as_deref())?;
    let ledger = config.build_ledger()?;
    let signer = match &cli.signer {
        Some(raw) => Address::parse(raw)?,
        None => ledger.owner(),
    };

    let core = AppCore::new(config.registry.clone())?;
    let report = core
        .connect(
            &StaticWallet::new(SigningIdentity::new(signer).with_label("cli")),
            &LocalConnector::new(ledger),
        )
        .await?;
    info!(signer = %report.identity.address, "connected");
    if let Some(Err(e)) = &report.refresh {
        eprintln!("warning: initial refresh failed: {e}");
    }

    let shell = Shell::new(&core);
    let mut stdout = std::io::stdout();
    let one_shot = match cli.command {
        None | Some(Commands::Shell) => None,
        Some(Commands::Users) => Some(Command::Users),
        Some(Commands::Register {
            username,
            address,
            amount,
        }) => Some(Command::Register {
            username,
            address,
            amount,
        }),
        Some(Commands::Redeem { amount }) => Some(Command::Redeem(amount)),
        Some(Commands::Reward { username, amount }) => Some(Command::Reward { username, amount }),
    };

    match one_shot {
        Some(command) => {
            shell.execute(command, &mut stdout).await?;
        }
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            shell.run(stdin, &mut stdout).await?;
        }
    }
    Ok(())
}
