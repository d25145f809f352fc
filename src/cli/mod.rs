pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(about = "Back-office CLI - database setup and user administration")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply the embedded database migrations")]
    Migrate,

    #[command(about = "Seed the module catalog and optionally an admin account")]
    Seed(commands::seed::SeedArgs),

    #[command(about = "User account management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Print a bcrypt hash for a password")]
    HashPassword {
        #[arg(help = "Plain-text password")]
        password: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    crate::config::config().validate()?;

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Seed(args) => commands::seed::handle(args, output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::HashPassword { password } => commands::hash_password::handle(&password, output_format),
    }
}
