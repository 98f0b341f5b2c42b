//! `voxgate status` — show configuration and provider status.

use anyhow::Result;

use voxgate_core::config::{get_config_path, load_config};
use voxgate_providers::registry::PROVIDERS;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("Voxgate Status");
    println!();

    let config_exists = config_path.exists();
    println!(
        "  {:<18} {} {}",
        "Config:",
        config_path.display(),
        if config_exists { "ok" } else { "(not found)" }
    );

    println!("  {:<18} {}", "Fast model:", config.router.fast_model);
    println!(
        "  {:<18} {}",
        "Reasoning model:", config.router.reasoning_model
    );
    println!(
        "  {:<18} {}",
        "Sovereign proxy:",
        if config.router.sovereign_proxy {
            "on (local backend first)"
        } else {
            "off"
        }
    );

    println!();
    println!("  Providers:");
    for descriptor in PROVIDERS {
        let state = if config.router.providers.is_configured(descriptor.id) {
            "configured"
        } else {
            "not configured"
        };
        println!("    {:<22} {}", descriptor.display_name, state);
    }

    println!();
    println!(
        "  {:<18} {}",
        "Live endpoint:",
        if config.live.is_configured() {
            config.live.endpoint.as_str()
        } else {
            "(no API key set)"
        }
    );
    println!("  {:<18} {}", "Live model:", config.live.model);
    println!();

    Ok(())
}
