//! Larder CLI - Database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! larder-cli migrate
//!
//! # Create a verified user
//! larder-cli user create -e ana@example.com -n "Ana" -p "correct horse" --verified
//!
//! # Verify an existing user
//! larder-cli user verify -e ana@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "larder-cli")]
#[command(author, version, about = "Larder CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Mark the email as already verified
        #[arg(long)]
        verified: bool,
    },
    /// Mark a user's email as verified
    Verify {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

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
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                password,
                verified,
            } => {
                commands::user::create(&email, &name, &password, verified).await?;
            }
            UserAction::Verify { email } => commands::user::verify(&email).await?,
        },
    }
    Ok(())
}
