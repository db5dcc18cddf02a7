use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod utils;

use commands::data::DataCommands;

/// natours - Tour booking API server
#[derive(Parser)]
#[command(name = "natours")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Configuration file (defaults to ./config.toml)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Load tours.json, users.json and reviews.json from this directory
        #[arg(long, value_name = "DIR")]
        seed: Option<PathBuf>,
    },
    /// Development data commands
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },
    /// Check a running server's health endpoint
    Health {
        /// Base URL of the server
        #[arg(long, default_value = "http://localhost:3000", env = "NATOURS_URL")]
        url: String,

        /// Show status code and response body
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, seed } => commands::serve::execute(config, seed).await,
        Commands::Data { command } => commands::data::execute(command).await,
        Commands::Health { url, verbose } => commands::health::execute(verbose, url).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);

            if let Some(source) = e.source() {
                eprintln!("\n{} {}", "Caused by:".yellow(), source);
            }

            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_arguments() {
        let cli = Cli::try_parse_from(["natours", "serve", "--seed", "natours/dev-data"]).unwrap();
        match cli.command {
            Commands::Serve { config, seed } => {
                assert!(config.is_none());
                assert_eq!(seed, Some(PathBuf::from("natours/dev-data")));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_data_check_requires_dir() {
        assert!(Cli::try_parse_from(["natours", "data", "check"]).is_err());
        let cli = Cli::try_parse_from(["natours", "data", "check", "seed"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Data { command: DataCommands::Check { dir } } if dir == PathBuf::from("seed")
        ));
    }

    #[test]
    fn test_health_default_url() {
        let cli = Cli::try_parse_from(["natours", "health"]).unwrap();
        match cli.command {
            Commands::Health { url, verbose } => {
                assert!(url.starts_with("http://"));
                assert!(!verbose);
            }
            _ => panic!("expected health"),
        }
    }
}
