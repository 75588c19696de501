//! Application initialization and configuration

use anyhow::{Context, Result};
use log::{debug, LevelFilter};
use std::str::FromStr;

use crate::config::{ConfigManager, MinerConfig, DEFAULT_COMMITS_PER_PERIOD, DEFAULT_MONTHS_PER_PERIOD};
use crate::period::{PeriodPolicy, PeriodType};
use crate::processors::ChurnMode;
use crate::{cli, logging};

pub fn load_configuration(args: &cli::Args) -> Result<ConfigManager> {
    let mut manager = match &args.config_file {
        Some(config_file) => ConfigManager::load_from_file(config_file.clone())?,
        None => ConfigManager::load()?,
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Logging settings; command line flags win over the `base` section
pub fn configure_logging(args: &cli::Args, config: &ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        config
            .get_log_level("base", "console-level")
            .context("Invalid console-level in configuration")?
            .unwrap_or(LevelFilter::Info)
    };

    let format = if !args.log_format.eq_ignore_ascii_case("text") {
        logging::LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format) => logging::LogFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?,
            None => logging::LogFormat::Text,
        }
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));
    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => config
            .get_log_level("base", "file-log-level")
            .context("Invalid file-log-level in configuration")?,
    };

    let (destination, file_level) = match log_file {
        Some(path) => {
            let level = file_level.unwrap_or(console_level);
            debug!("File logging enabled: {} ({:?})", path.display(), level);
            (logging::LogDestination::Both(path), Some(level))
        }
        None if file_level.is_some() => {
            return Err(anyhow::anyhow!("A file log level is configured without a log file"));
        }
        None => (logging::LogDestination::Console, None),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Merge configuration file settings with command line overrides
pub fn resolve_miner_config(args: &cli::Args, config: &ConfigManager) -> Result<MinerConfig> {
    let mut builder = config.miner_config()?;

    if let Some(threads) = args.threads {
        builder = builder.with_threads(threads);
    }
    if !args.branches.is_empty() {
        builder = builder.with_branches(args.branches.clone());
    }
    if args.reversed {
        builder = builder.with_reversed(true);
    }
    if let Some(output) = &args.output {
        builder = builder.with_output_dir(output.clone());
    }

    let period_type = args
        .period_type
        .as_deref()
        .map(PeriodType::from_str)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let configured = builder.period_policy();
    let policy = match (period_type, args.months, args.commits) {
        (Some(PeriodType::Time), months, _) => PeriodPolicy::TimeBased {
            months: months.unwrap_or(match configured {
                PeriodPolicy::TimeBased { months } => months,
                PeriodPolicy::CountBased { .. } => DEFAULT_MONTHS_PER_PERIOD,
            }),
        },
        (Some(PeriodType::Count), _, commits) => PeriodPolicy::CountBased {
            commits: commits.unwrap_or(match configured {
                PeriodPolicy::CountBased { commits } => commits,
                PeriodPolicy::TimeBased { .. } => DEFAULT_COMMITS_PER_PERIOD,
            }),
        },
        (None, Some(months), _) => PeriodPolicy::TimeBased { months },
        (None, None, Some(commits)) => PeriodPolicy::CountBased { commits },
        (None, None, None) => configured,
    };
    builder = builder.with_period_policy(policy);

    if let Some(change_type) = &args.change_type {
        builder = builder.with_churn_mode(ChurnMode::from_str(change_type).map_err(|e| anyhow::anyhow!(e))?);
    }
    if !args.files.is_empty() {
        builder = builder.with_file_filter(args.files.clone());
    }
    if let Some(half_life) = args.half_life {
        builder = builder.with_half_life_days(half_life);
    }
    if let Some(top_n) = args.top_n {
        builder = builder.with_top_n(top_n);
    }
    if args.ascending {
        builder = builder.with_descending(false);
    }

    let config = builder.build()?;
    debug!("Resolved miner configuration: {:?}", config);
    Ok(config)
}
