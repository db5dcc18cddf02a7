use anyhow::{Context, Result};
use std::path::PathBuf;

use natours::prelude::*;
use natours::seed;

use crate::utils;

pub async fn execute(config_path: Option<PathBuf>, seed_dir: Option<PathBuf>) -> Result<()> {
    let config = match &config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    init_tracing(&config).context("Failed to initialize tracing")?;

    let state = AppState::builder()
        .config(config.clone())
        .build()
        .context("Failed to build application state")?;

    if let Some(dir) = seed_dir {
        let summary = seed::import_dir(&dir, state.collections(), state.hasher())
            .await
            .with_context(|| format!("Failed to load dev data from {}", dir.display()))?;
        utils::success(&format!(
            "Loaded {} tours, {} users, {} reviews",
            summary.tours, summary.users, summary.reviews
        ));
    }

    let app = router(state).context("Failed to build router")?;
    utils::info(&format!(
        "Listening on http://{}:{}",
        config.service.host, config.service.port
    ));

    Server::new(config)
        .serve(app)
        .await
        .context("Server exited with an error")
}
