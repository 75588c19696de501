use clap::{ArgAction, Parser};
use anyhow::Result;
use std::path::PathBuf;
use log::debug;

use crate::config::split_list;
use crate::miners::MinerKind;
use crate::period::PeriodType;
use crate::processors::ChurnMode;

/// Git History Miner
#[derive(Parser, Debug)]
#[command(name = "gminer")]
#[command(about = "Mines git history for code churn, file ownership, co-edit networks and coordination needs")]
#[command(version)]
pub struct Args {
    /// Metric to mine
    #[arg(value_enum, value_name = "MINER")]
    pub miner: MinerKind,

    /// Path to git repository (defaults to the current directory)
    #[arg(short = 'r', long = "repo", alias = "repository", value_name = "PATH")]
    pub repository: Option<String>,

    /// Branches to mine (names or `*` patterns, comma-separated or repeated); defaults to HEAD
    #[arg(short = 'b', long = "branch", value_name = "BRANCH", action = ArgAction::Append)]
    pub branches: Vec<String>,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(short = 'j', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Walk history oldest first
    #[arg(long)]
    pub reversed: bool,

    /// Directory results are written to
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    // ============ PERIODS ============
    /// Period kind for churn: time or count
    #[arg(long = "period-type", value_name = "TYPE")]
    pub period_type: Option<String>,

    /// Calendar months per time-based period
    #[arg(long, value_name = "N")]
    pub months: Option<u32>,

    /// Commits per count-based period
    #[arg(long, value_name = "N")]
    pub commits: Option<usize>,

    // ============ MINER OPTIONS ============
    /// Churn unit: lines or files
    #[arg(long = "change-type", value_name = "TYPE")]
    pub change_type: Option<String>,

    /// Restrict churn to these files or directories (comma-separated or repeated)
    #[arg(short = 'F', long = "file", value_name = "PATH", action = ArgAction::Append)]
    pub files: Vec<String>,

    /// Ownership half-life in days
    #[arg(long = "half-life", value_name = "DAYS")]
    pub half_life: Option<f64>,

    /// Also export a graph of the N strongest relationships
    #[arg(short = 'n', long = "top-n", value_name = "N")]
    pub top_n: Option<usize>,

    /// Export the weakest relationships instead of the strongest
    #[arg(long)]
    pub ascending: bool,

    // ============ LOGGING & CONFIGURATION ============
    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,
}

impl Args {
    /// Expand comma-separated list arguments
    pub fn expand_lists(mut self) -> Self {
        self.branches = self.branches.iter().flat_map(|b| split_list(b)).collect();
        self.files = self.files.iter().flat_map(|f| split_list(f)).collect();
        self
    }
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse().expand_lists();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();
    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {}
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Valid options: text, json",
                args.log_format
            ))
        }
    }

    if let Some(ref level) = args.log_file_level {
        crate::logging::parse_log_level(level)?;
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!("--log-file-level requires --log-file to be specified"));
    }

    if args.threads == Some(0) {
        return Err(anyhow::anyhow!("--threads must be greater than zero"));
    }

    let period_type = match &args.period_type {
        Some(value) => Some(value.parse::<PeriodType>().map_err(|e| anyhow::anyhow!(e))?),
        None => None,
    };
    match period_type {
        Some(PeriodType::Time) if args.commits.is_some() => {
            return Err(anyhow::anyhow!("--commits only applies to count-based periods"));
        }
        Some(PeriodType::Count) if args.months.is_some() => {
            return Err(anyhow::anyhow!("--months only applies to time-based periods"));
        }
        None if args.months.is_some() && args.commits.is_some() => {
            return Err(anyhow::anyhow!("--months and --commits are mutually exclusive"));
        }
        _ => {}
    }

    if let Some(ref change_type) = args.change_type {
        change_type.parse::<ChurnMode>().map_err(|e| anyhow::anyhow!(e))?;
    }

    if args.top_n.is_some() && args.miner == MinerKind::Churn {
        return Err(anyhow::anyhow!(
            "--top-n applies to ownership, co-edit and coordination; churn has no graph export"
        ));
    }

    debug!("CLI arguments validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("gminer").chain(args.iter().copied()))
            .unwrap()
            .expand_lists()
    }

    #[test]
    fn test_miner_is_required() {
        assert!(Args::try_parse_from(["gminer"]).is_err());
        assert!(Args::try_parse_from(["gminer", "blame"]).is_err());
        assert_eq!(parse(&["co-edit"]).miner, MinerKind::CoEdit);
    }

    #[test]
    fn test_repeated_and_comma_separated_lists() {
        let args = parse(&["churn", "-b", "main,dev", "--branch", "release/*", "-F", "src/,docs"]);
        assert_eq!(args.branches, vec!["main", "dev", "release/*"]);
        assert_eq!(args.files, vec!["src/", "docs"]);
    }

    #[test]
    fn test_repo_alias() {
        let args = parse(&["ownership", "--repository", "/tmp/repo", "-j", "4"]);
        assert_eq!(args.repository.as_deref(), Some("/tmp/repo"));
        assert_eq!(args.threads, Some(4));
    }

    #[test]
    fn test_validate_args_success() {
        let args = parse(&["churn", "--verbose", "--log-format", "json", "--commits", "10", "--change-type", "files"]);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_conflicting_log_flags() {
        assert!(validate_args(&parse(&["churn", "-v", "-q"])).is_err());
    }

    #[test]
    fn test_validate_args_invalid_format() {
        assert!(validate_args(&parse(&["churn", "--log-format", "xml"])).is_err());
    }

    #[test]
    fn test_validate_args_file_level_without_file() {
        assert!(validate_args(&parse(&["churn", "--log-file-level", "debug"])).is_err());
        assert!(validate_args(&parse(&["churn", "--log-file", "x.log", "--log-file-level", "debug"])).is_ok());
    }

    #[test]
    fn test_validate_period_options() {
        assert!(validate_args(&parse(&["churn", "--period-type", "time", "--commits", "5"])).is_err());
        assert!(validate_args(&parse(&["churn", "--period-type", "count", "--months", "5"])).is_err());
        assert!(validate_args(&parse(&["churn", "--months", "2", "--commits", "5"])).is_err());
        assert!(validate_args(&parse(&["churn", "--period-type", "weekly"])).is_err());
        assert!(validate_args(&parse(&["churn", "--period-type", "count", "--commits", "5"])).is_ok());
    }

    #[test]
    fn test_validate_top_n() {
        assert!(validate_args(&parse(&["churn", "--top-n", "10"])).is_err());
        assert!(validate_args(&parse(&["coordination", "--top-n", "10", "--ascending"])).is_ok());
        assert!(validate_args(&parse(&["ownership", "--threads", "0"])).is_err());
    }
}
