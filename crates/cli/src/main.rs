//! Ecommerce CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ecom-cli migrate
//!
//! # Create a verified user (password from ECOM_USER_PASSWORD)
//! ECOM_USER_PASSWORD=... ecom-cli user create -u alice -e alice@example.com --staff
//!
//! # Seed categories and products
//! ecom-cli catalog seed catalog.yaml
//!
//! # Remove expired entries from the refresh token blacklist
//! ecom-cli token purge
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ecom-cli")]
#[command(author, version, about = "Ecommerce API CLI tools")]
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
    /// Manage the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage issued tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a verified user; the password is read from `ECOM_USER_PASSWORD`
    Create {
        /// Alphanumeric username
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Allow the user to manage the catalog
        #[arg(long)]
        staff: bool,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Upsert categories and products from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Delete blacklisted refresh tokens that have expired
    Purge,
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
                username,
                email,
                staff,
            } => {
                commands::user::create(&username, &email, staff).await?;
            }
        },
        Commands::Catalog { action } => match action {
            CatalogAction::Seed { file } => commands::catalog::seed(&file).await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Purge => commands::token::purge().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "ecom-cli", "user", "create", "-u", "alice", "-e", "a@b.co", "--staff",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Create { staff: true, .. }
            })
        ));
    }
}
