use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use toml::Value;

use crate::engine::{EngineConfig, DEFAULT_LOG_FREQUENCY};
use crate::period::{PeriodPolicy, PeriodType};
use crate::processors::ownership::DEFAULT_HALF_LIFE_DAYS;
use crate::processors::ChurnMode;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "GMINER_CONFIG";

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load the first configuration file found by discovery, or an empty configuration
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Checking for configuration at: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Get a value. Priority: selected section, then `section`, then `base`.
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Get a value parsed with `FromStr`
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_value(section, key) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid value for {}.{}: {} ({})", section, key, value, e)),
            None => Ok(None),
        }
    }

    /// Get a list given either as a TOML array or as comma-separated text
    pub fn get_list(&self, section: &str, key: &str) -> Result<Option<Vec<String>>> {
        let Some(value) = self.get_value(section, key) else {
            return Ok(None);
        };
        if value.trim_start().starts_with('[') {
            let table: toml::Table = format!("list = {}", value)
                .parse()
                .with_context(|| format!("Invalid list for {}.{}: {}", section, key, value))?;
            let items = table
                .get("list")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(toml_value_to_string).collect())
                .unwrap_or_default();
            return Ok(Some(items));
        }
        Ok(Some(split_list(value)))
    }

    /// Mining settings from the `miner`, `periods`, `churn`, `ownership` and
    /// `export` sections, on top of the defaults
    pub fn miner_config(&self) -> Result<MinerConfigBuilder> {
        let mut builder = MinerConfig::builder();

        if let Some(threads) = self.get_parsed::<usize>("miner", "threads")? {
            builder = builder.with_threads(threads);
        }
        if let Some(branches) = self.get_list("miner", "branches")? {
            builder = builder.with_branches(branches);
        }
        if let Some(reversed) = self.get_bool("miner", "reversed")? {
            builder = builder.with_reversed(reversed);
        }
        if let Some(output_dir) = self.get_path("miner", "output-dir") {
            builder = builder.with_output_dir(output_dir);
        }

        let months = self.get_parsed::<u32>("periods", "months")?;
        let commits = self.get_parsed::<usize>("periods", "commits")?;
        let period_type = self.get_parsed::<PeriodType>("periods", "period-type")?;
        match (period_type, months, commits) {
            (Some(PeriodType::Count), _, commits) | (None, None, commits @ Some(_)) => {
                builder = builder.with_period_policy(PeriodPolicy::CountBased {
                    commits: commits.unwrap_or(DEFAULT_COMMITS_PER_PERIOD),
                });
            }
            (Some(PeriodType::Time), months, _) | (None, months @ Some(_), _) => {
                builder = builder.with_period_policy(PeriodPolicy::TimeBased {
                    months: months.unwrap_or(DEFAULT_MONTHS_PER_PERIOD),
                });
            }
            (None, None, None) => {}
        }

        if let Some(mode) = self.get_parsed::<ChurnMode>("churn", "change-type")? {
            builder = builder.with_churn_mode(mode);
        }
        if let Some(files) = self.get_list("churn", "files")? {
            builder = builder.with_file_filter(files);
        }
        if let Some(half_life) = self.get_parsed::<f64>("ownership", "half-life-days")? {
            builder = builder.with_half_life_days(half_life);
        }
        if let Some(top_n) = self.get_parsed::<usize>("export", "top-n")? {
            builder = builder.with_top_n(top_n);
        }
        if let Some(descending) = self.get_bool("export", "descending")? {
            builder = builder.with_descending(descending);
        }

        Ok(builder)
    }
}

/// Split comma-separated values, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("gminer").join("config.toml"));
    }
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".gminer.toml"));
    }
    paths.push(PathBuf::from("./.gminer.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML into string-valued sections
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let table: toml::Table = content.parse().context("Failed to parse TOML content")?;
    let mut config = Configuration::new();
    flatten_toml_table(&table, "", &mut config);
    Ok(config)
}

/// Nested tables become `outer.inner` sections; top-level keys land in `base`
fn flatten_toml_table(table: &toml::Table, prefix: &str, config: &mut Configuration) {
    for (key, value) in table {
        match value {
            Value::Table(subtable) => {
                let section = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml_table(subtable, &section, config);
            }
            _ => {
                let section = if prefix.is_empty() { "base" } else { prefix };
                config
                    .entry(section.to_string())
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(value));
            }
        }
    }
}

fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}

pub const DEFAULT_MONTHS_PER_PERIOD: u32 = 1;
pub const DEFAULT_COMMITS_PER_PERIOD: usize = 100;
pub const DEFAULT_OUTPUT_DIR: &str = "gminer-output";

/// Settings of one mining run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MinerConfig {
    pub threads: usize,
    pub branches: Vec<String>,
    pub reversed: bool,
    pub output_dir: PathBuf,
    pub period_policy: PeriodPolicy,
    pub churn_mode: ChurnMode,
    /// Paths churn is restricted to; empty means all
    pub file_filter: Vec<String>,
    pub half_life_days: f64,
    /// Number of edges in exported graphs; no graph when `None`
    pub top_n: Option<usize>,
    /// Export the heaviest edges (lightest when false)
    pub descending: bool,
}

/// Configuration validation error
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Thread count must be greater than zero")]
    InvalidThreads,
    #[error("Invalid period configuration: {0}")]
    InvalidPeriod(String),
    #[error("Ownership half-life must be a positive number of days, got {0}")]
    InvalidHalfLife(f64),
    #[error("--top-n must be greater than zero")]
    InvalidTopN,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            branches: Vec::new(),
            reversed: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            period_policy: PeriodPolicy::default(),
            churn_mode: ChurnMode::default(),
            file_filter: Vec::new(),
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
            top_n: None,
            descending: true,
        }
    }
}

impl MinerConfig {
    pub fn builder() -> MinerConfigBuilder {
        MinerConfigBuilder {
            config: MinerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }
        self.period_policy
            .validate()
            .map_err(|e| ConfigError::InvalidPeriod(e.to_string()))?;
        if !(self.half_life_days.is_finite() && self.half_life_days > 0.0) {
            return Err(ConfigError::InvalidHalfLife(self.half_life_days));
        }
        if self.top_n == Some(0) {
            return Err(ConfigError::InvalidTopN);
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            threads: self.threads,
            branches: self.branches.clone(),
            reversed: self.reversed,
            log_frequency: DEFAULT_LOG_FREQUENCY,
        }
    }
}

/// Fluent construction of a [`MinerConfig`]
#[derive(Debug, Clone)]
pub struct MinerConfigBuilder {
    config: MinerConfig,
}

impl MinerConfigBuilder {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    pub fn with_branches(mut self, branches: Vec<String>) -> Self {
        self.config.branches = branches;
        self
    }

    pub fn with_reversed(mut self, reversed: bool) -> Self {
        self.config.reversed = reversed;
        self
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.config.output_dir = output_dir;
        self
    }

    pub fn with_period_policy(mut self, policy: PeriodPolicy) -> Self {
        self.config.period_policy = policy;
        self
    }

    pub fn with_churn_mode(mut self, mode: ChurnMode) -> Self {
        self.config.churn_mode = mode;
        self
    }

    pub fn with_file_filter(mut self, files: Vec<String>) -> Self {
        self.config.file_filter = files;
        self
    }

    pub fn with_half_life_days(mut self, days: f64) -> Self {
        self.config.half_life_days = days;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = Some(top_n);
        self
    }

    pub fn with_descending(mut self, descending: bool) -> Self {
        self.config.descending = descending;
        self
    }

    pub fn period_policy(&self) -> PeriodPolicy {
        self.config.period_policy
    }

    pub fn build(self) -> Result<MinerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager(toml: &str) -> ConfigManager {
        ConfigManager::from_config(parse_toml_config(toml).unwrap())
    }

    #[test]
    fn test_parse_toml_config() {
        let config = parse_toml_config(
            r#"
console-level = "debug"

[base]
log-format = "json"

[miner]
threads = 4
branches = ["main", "release/*"]

[profile.ci]
threads = 2
"#,
        )
        .unwrap();

        assert_eq!(config["base"]["console-level"], "debug");
        assert_eq!(config["base"]["log-format"], "json");
        assert_eq!(config["miner"]["threads"], "4");
        assert_eq!(config["profile.ci"]["threads"], "2");
    }

    #[test]
    fn test_value_lookup_falls_back_to_base() {
        let mut manager = manager(
            r#"
[base]
reversed = true

[miner]
threads = 4

[ci]
threads = 1
"#,
        );
        assert_eq!(manager.get_value("miner", "threads").unwrap(), "4");
        assert_eq!(manager.get_value("miner", "reversed").unwrap(), "true");
        assert!(manager.get_value("miner", "missing").is_none());

        manager.select_section("ci".to_string());
        assert_eq!(manager.get_value("miner", "threads").unwrap(), "1");
    }

    #[test]
    fn test_typed_getters() {
        let manager = manager(
            r#"
[base]
quiet = "maybe"
console-level = "warn"

[miner]
threads = "many"
branches = "main, dev ,"
"#,
        );
        assert!(manager.get_bool("base", "quiet").is_err());
        assert_eq!(manager.get_log_level("base", "console-level").unwrap(), Some(log::LevelFilter::Warn));
        assert!(manager.get_parsed::<usize>("miner", "threads").is_err());
        assert_eq!(
            manager.get_list("miner", "branches").unwrap(),
            Some(vec!["main".to_string(), "dev".to_string()])
        );
    }

    #[test]
    fn test_miner_config_from_sections() {
        let config = manager(
            r#"
[miner]
threads = 3
branches = ["main", "origin/*"]
reversed = true
output-dir = "out"

[periods]
period-type = "count"
commits = 50

[churn]
change-type = "files"

[ownership]
half-life-days = 90.0

[export]
top-n = 25
descending = false
"#,
        )
        .miner_config()
        .unwrap()
        .build()
        .unwrap();

        assert_eq!(config.threads, 3);
        assert_eq!(config.branches, vec!["main", "origin/*"]);
        assert!(config.reversed);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.period_policy, PeriodPolicy::CountBased { commits: 50 });
        assert_eq!(config.churn_mode, ChurnMode::Files);
        assert_eq!(config.half_life_days, 90.0);
        assert_eq!(config.top_n, Some(25));
        assert!(!config.descending);
    }

    #[test]
    fn test_period_policy_inference() {
        let builder = manager("[periods]\nmonths = 3\n").miner_config().unwrap();
        assert_eq!(builder.period_policy(), PeriodPolicy::TimeBased { months: 3 });

        let builder = manager("[periods]\ncommits = 20\n").miner_config().unwrap();
        assert_eq!(builder.period_policy(), PeriodPolicy::CountBased { commits: 20 });

        let builder = manager("[periods]\nperiod-type = \"count\"\n").miner_config().unwrap();
        assert_eq!(
            builder.period_policy(),
            PeriodPolicy::CountBased { commits: DEFAULT_COMMITS_PER_PERIOD }
        );

        let builder = manager("").miner_config().unwrap();
        assert_eq!(builder.period_policy(), PeriodPolicy::default());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            MinerConfig::builder().with_threads(0).build().unwrap_err(),
            ConfigError::InvalidThreads
        );
        assert!(matches!(
            MinerConfig::builder()
                .with_period_policy(PeriodPolicy::TimeBased { months: 0 })
                .build(),
            Err(ConfigError::InvalidPeriod(_))
        ));
        assert!(MinerConfig::builder().with_half_life_days(-1.0).build().is_err());
        assert_eq!(MinerConfig::builder().with_top_n(0).build().unwrap_err(), ConfigError::InvalidTopN);
        assert!(MinerConfig::builder().build().is_ok());
    }

    #[test]
    fn test_config_file_loading() {
        let file = NamedTempFile::new().unwrap();
        fs::write(&file, "[miner]\nthreads = 2\n").unwrap();

        let manager = ConfigManager::load_from_file(file.path().to_path_buf()).unwrap();
        assert_eq!(manager.get_value("miner", "threads").unwrap(), "2");
        assert_eq!(manager.config_file_path(), Some(file.path()));
    }

    #[test]
    fn test_engine_config() {
        let config = MinerConfig::builder()
            .with_threads(6)
            .with_branches(vec!["main".to_string()])
            .build()
            .unwrap();
        let engine = config.engine_config();
        assert_eq!(engine.threads, 6);
        assert_eq!(engine.branches, vec!["main"]);
        assert_eq!(engine.log_frequency, DEFAULT_LOG_FREQUENCY);
    }
}
