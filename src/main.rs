use anyhow::Result;
use log::{error, info};
use std::process;

use gminer::{app, cli, git, logging};

fn main() {
    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;
    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;
    if let Some(path) = config_manager.config_file_path() {
        info!("Using configuration file {}", path.display());
    }

    let miner_config = app::resolve_miner_config(&args, &config_manager)?;
    let repo_path = git::resolve_repository_path(args.repository.as_deref())?;

    let summary = app::run_miner(&repo_path, args.miner, &miner_config)?;
    println!("{}", serde_json::to_string_pretty(&summary.report())?);
    Ok(())
}
