pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "jukebot",
    about = "Jukebot operator CLI",
    long_about = "Inspect jukebot configuration, check Slack and Spotify readiness, and print the Spotify login URL.",
    after_help = "Examples:\n  jukebot doctor --json\n  jukebot config\n  jukebot auth-url"
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
    #[command(about = "Validate config, Slack tokens, Spotify credentials, and the callback listener")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the Spotify authorization URL for the configured client")]
    AuthUrl,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::AuthUrl => commands::auth_url::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
