use anyhow::{Context, Result};
use colored::Colorize;

use natours::health::HealthResponse;

pub async fn execute(verbose: bool, url: String) -> Result<()> {
    println!("{}", "Checking service health...".bold());
    println!();

    let health_url = format!("{}/health", url.trim_end_matches('/'));
    print!("Health endpoint ({})... ", health_url);

    match check_endpoint(&health_url, verbose).await {
        Ok(response) => {
            println!("{}", "✓ OK".green().bold());
            if verbose {
                println!("  Service: {}", response.service);
                if let Some(version) = response.version {
                    println!("  Version: {}", version);
                }
            }
        }
        Err(e) => {
            println!("{}", "✗ FAILED".red().bold());
            println!("  Error: {}", e);
            return Err(e);
        }
    }

    println!();
    println!("{}", "Service is healthy!".green().bold());
    Ok(())
}

async fn check_endpoint(url: &str, verbose: bool) -> Result<HealthResponse> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send request")?;

    let status = response.status();
    if verbose {
        println!();
        println!("  HTTP Status: {}", status);
    }

    if !status.is_success() {
        anyhow::bail!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
    }

    let body = response
        .text()
        .await
        .context("Failed to read response body")?;
    if verbose {
        println!("  Response: {}", body);
    }

    let health: HealthResponse =
        serde_json::from_str(&body).with_context(|| format!("Unexpected response format: {body}"))?;
    if !health.is_ok() {
        anyhow::bail!("Service reported status {}", health.status);
    }
    Ok(health)
}
