//! OnAir environment check tool.
//!
//! Loads the playout server configuration the same way the server does at
//! startup – parse, resolve, migrate template hosts, provision directories –
//! and prints the resolved environment.  Useful for validating a
//! configuration file before deploying it.
//!
//! Usage: `onair-envcheck [config-file]`, where `config-file` is resolved
//! against the current directory and defaults to `onair.config`.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "onair.config";

fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let filename = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    info!("OnAir environment check {}", onair_env::version());

    onair_env::configure(&filename)
        .with_context(|| format!("could not configure the environment from {filename}"))?;

    let environment = onair_env::environment()?;

    println!("version         {}", onair_env::version());
    println!("initial-path    {}", environment.initial_folder().display());
    println!("media-path      {}", environment.media_folder());
    println!("log-path        {}", environment.log_folder());
    println!("template-path   {}", environment.template_folder());
    println!("data-path       {}", environment.data_folder());
    println!("font-path       {}", environment.font_folder());
    println!("thumbnails-path {}", environment.thumbnails_folder());
    println!("system-fonts    {}", onair_env::system_font_folder());
    // The log level is consumed by the server's logging setup, not here;
    // report it so misspelled levels are caught early.
    println!(
        "log-level       {}",
        environment.properties().get_or("configuration.log-level", "info")
    );

    for warning in environment.warnings() {
        warn!("setup warning: {warning}");
    }

    if environment.warnings().is_empty() {
        info!("environment OK");
    } else {
        info!(
            "environment configured with {} setup warning(s)",
            environment.warnings().len()
        );
    }
    Ok(())
}
