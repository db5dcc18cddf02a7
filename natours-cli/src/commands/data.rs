use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use natours::prelude::*;
use natours::seed::{self, SEED_FILES};

use crate::utils;

#[derive(Subcommand)]
pub enum DataCommands {
    /// Validate a seed directory against the models without serving it
    Check {
        /// Directory holding tours.json, users.json and reviews.json
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

pub async fn execute(command: DataCommands) -> Result<()> {
    match command {
        DataCommands::Check { dir } => check(&dir).await.map(|_| ()),
    }
}

/// Import `dir` into a scratch store and report what loaded
async fn check(dir: &Path) -> Result<SeedSummary> {
    utils::section(&format!("Checking {}", dir.display()));
    for file in SEED_FILES {
        let present = dir.join(file).is_file();
        let mark = if present { "found".green() } else { "missing".red() };
        println!("  {file}: {mark}");
    }

    let config = Config::default();
    let hasher =
        PasswordHasher::new(&config.password).context("Failed to set up password hashing")?;
    let collections = Collections::new();

    match seed::import_dir(dir, &collections, &hasher).await {
        Ok(summary) => {
            utils::success(&format!(
                "{} tours, {} users, {} reviews are valid",
                summary.tours, summary.users, summary.reviews
            ));
            Ok(summary)
        }
        Err(e) => {
            utils::error(&e.to_string());
            Err(e).context("Seed data is invalid")
        }
    }
}
