//! task-extractor - command-line entry point
//!
//! Reads text from the arguments (or stdin when there are none), extracts
//! candidate tasks and prints them as JSON on stdout.

use std::path::Path;

use anyhow::Context;
use task_extractor::{config::Config, Extractor, TaskSource, UserProfile};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the JSON result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_extractor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: online={}, models={}/{}",
        config.is_online(),
        config.fast_model,
        config.reasoning_model
    );

    let profile = match std::env::var("USER_PROFILE_PATH") {
        Ok(path) if !path.trim().is_empty() => load_profile(Path::new(path.trim())).await,
        _ => None,
    };

    let text = read_input().await?;
    let extractor = Extractor::from_config(&config);
    let extraction = extractor
        .extract_on(&text, profile.as_ref(), chrono::Local::now().date_naive())
        .await;

    match &extraction.source {
        TaskSource::Model { repair_calls } => info!(
            "Extracted {} task(s) from model output ({} repair call(s))",
            extraction.tasks.len(),
            repair_calls
        ),
        TaskSource::Fallback { stage, reason } => warn!(
            "Used rule-based fallback ({} task(s)); gave up at {}: {}",
            extraction.tasks.len(),
            stage,
            reason
        ),
    }

    println!("{}", serde_json::to_string_pretty(&extraction.tasks)?);
    Ok(())
}

async fn read_input() -> anyhow::Result<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return Ok(args.join(" "));
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("failed to read text from stdin")?;
    Ok(text)
}

async fn load_profile(path: &Path) -> Option<UserProfile> {
    let loaded = async {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let profile: UserProfile = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        anyhow::Ok(profile)
    }
    .await;

    match loaded {
        Ok(profile) => {
            info!("Loaded user profile from {}", path.display());
            Some(profile)
        }
        Err(e) => {
            warn!("Ignoring user profile: {:#}", e);
            None
        }
    }
}
