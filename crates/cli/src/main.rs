//! Social sign-in CLI - migrations and offline pipeline tools.
//!
//! # Usage
//!
//! ```bash
//! # Run profile store migrations
//! signin-cli migrate
//!
//! # Normalize a captured provider credential
//! signin-cli normalize --file raw.json --federated federated.json
//!
//! # Merge a claim into an existing profile
//! signin-cli reconcile --claim claim.json --existing profile.json --uid 3f2a...
//!
//! # Show a stored profile
//! signin-cli profile show 3f2a...
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `normalize` - Raw credential to identity claim
//! - `reconcile` - Identity claim plus existing profile to next profile
//! - `profile show` - Print a stored profile

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "signin-cli")]
#[command(author, version, about = "Social sign-in CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run profile store migrations
    Migrate,
    /// Normalize a raw provider credential into an identity claim
    Normalize {
        /// Raw credential JSON (tagged with "provider")
        #[arg(short, long)]
        file: PathBuf,

        /// Federated identity JSON returned by the backend exchange
        #[arg(long)]
        federated: Option<PathBuf>,
    },
    /// Reconcile an identity claim against an existing profile
    Reconcile {
        /// Identity claim JSON
        #[arg(short, long)]
        claim: PathBuf,

        /// Existing profile JSON; omit for a first sign-in
        #[arg(short, long)]
        existing: Option<PathBuf>,

        /// Backend-issued uid
        #[arg(short, long)]
        uid: String,
    },
    /// Inspect stored profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print the stored profile for a uid
    Show {
        /// Backend-issued uid
        uid: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_signin=info,signin_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Normalize { file, federated } => {
            commands::pipeline::normalize(&file, federated.as_deref())?;
        }
        Commands::Reconcile {
            claim,
            existing,
            uid,
        } => commands::pipeline::reconcile(&claim, existing.as_deref(), &uid)?,
        Commands::Profile { action } => match action {
            ProfileAction::Show { uid } => commands::profile::show(&uid).await?,
        },
    }
    Ok(())
}
