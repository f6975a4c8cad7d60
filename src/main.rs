use std::path::PathBuf;

use clap::Parser;
use torrust_active_object::config::ENV_VAR_CONFIG_TOML_PATH;
use torrust_active_object::{app, bootstrap};

/// Runs a job worker guarded by a lock-free lifecycle, and shuts it down gracefully.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path of the TOML configuration file.
    #[arg(short, long, env = ENV_VAR_CONFIG_TOML_PATH)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), app::Error> {
    let args = Args::parse();

    let configuration = bootstrap::setup(args.config.as_deref())?;

    app::run(&configuration).await
}
