//! Voxgate CLI — entry point.
//!
//! # Commands
//!
//! - `voxgate generate PROMPT [-m MODEL] [--smart] [--json SCHEMA]` —
//!   one-shot text generation through the provider fallback chain
//! - `voxgate live` — real-time audio conversation (needs the
//!   `desktop-audio` feature)
//! - `voxgate status` — show configuration and provider status

mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use voxgate_core::config::load_config;
use voxgate_core::types::GenerationRequest;
use voxgate_providers::Router;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Voxgate — resilient multi-provider AI gateway with live audio
#[derive(Parser)]
#[command(name = "voxgate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate text through the provider fallback chain
    Generate {
        /// The prompt to send
        prompt: String,

        /// Model hint (defaults to the configured fast model)
        #[arg(short, long)]
        model: Option<String>,

        /// Use the reasoning model with a thinking budget
        #[arg(long, default_value_t = false)]
        smart: bool,

        /// Ask for a JSON object conforming to this schema (inline JSON)
        #[arg(long)]
        json: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Start a real-time audio conversation
    Live {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and provider status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            prompt,
            model,
            smart,
            json,
            logs,
        } => {
            init_logging(logs);
            run_generate(prompt, model, smart, json).await
        }
        Commands::Live { logs } => {
            init_logging(logs);
            run_live().await
        }
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Generate command
// ─────────────────────────────────────────────

async fn run_generate(
    prompt: String,
    model: Option<String>,
    smart: bool,
    json: Option<String>,
) -> Result<()> {
    let config = load_config(None);

    let model = model.unwrap_or_else(|| {
        if smart {
            config.router.reasoning_model.clone()
        } else {
            config.router.fast_model.clone()
        }
    });

    let mut request = GenerationRequest::text(&model, prompt);
    if smart {
        request = request.with_thinking_budget(2048);
    }

    let router = Router::new(config.router);

    match json {
        Some(schema) => {
            let schema: serde_json::Value =
                serde_json::from_str(&schema).context("--json schema is not valid JSON")?;
            let value = router
                .route_json(&request, &schema)
                .await
                .context("JSON generation failed")?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        None => {
            let result = router
                .route(&request)
                .await
                .context("text generation failed")?;
            info!(provider = %result.provider_used, "generation complete");
            println!("{}", result.text);
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────
// Live command
// ─────────────────────────────────────────────

#[cfg(feature = "desktop-audio")]
async fn run_live() -> Result<()> {
    use std::sync::Arc;
    use voxgate_audio::device::{CpalMicrophone, CpalSpeaker};
    use voxgate_audio::playback::PlaybackScheduler;
    use voxgate_live::{LiveSession, WsFactory};

    let config = load_config(None);

    let speaker = CpalSpeaker::start().context("failed to open output device")?;
    let scheduler = Arc::new(PlaybackScheduler::new(Arc::new(speaker)));
    let factory = Arc::new(WsFactory::new(config.live.clone()));
    let mut session = LiveSession::new(factory, Box::<CpalMicrophone>::default(), scheduler);

    session.start().await.context("failed to open live session")?;
    println!("Live session open — speak into the microphone. Ctrl-C to end.");

    let mut status = session.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("status: {:?}", *status.borrow());
            }
        }
    }

    session.close().await;
    println!("Session closed.");
    Ok(())
}

#[cfg(not(feature = "desktop-audio"))]
async fn run_live() -> Result<()> {
    anyhow::bail!(
        "this build has no audio devices; rebuild with `--features desktop-audio` to use `voxgate live`"
    )
}

// ─────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("voxgate=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
