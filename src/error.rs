//! Mining Error Types
//!
//! Error types shared by the repository access layer, the mining engine and
//! the export stage.

use thiserror::Error;

/// Errors that can occur while mining a repository
#[derive(Debug, Error)]
pub enum MiningError {
    /// Repository access error
    #[error("Repository error: {0}")]
    Repository(String),

    /// Branch listing or resolution failed
    #[error("Branch resolution failed: {0}")]
    BranchResolution(String),

    /// A single unit of work failed
    #[error("Job failed: {0}")]
    Job(String),

    /// Configuration error
    #[error("Configuration problem: {0}\n\nCheck your configuration file or command line arguments. Run 'gminer --help' for usage information.")]
    Configuration(String),

    /// Export of mined data failed
    #[error("Export failed: {0}")]
    Export(String),

    /// Underlying git error
    #[error(transparent)]
    Git(#[from] git2::Error),

    /// File system error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MiningError {
    /// Create a repository error with context
    pub fn repository(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let enhanced_msg = if msg.contains("not a git repository") || msg.contains("could not find repository") {
            format!("{msg}\n\nMake sure the path points at a git repository, or specify one with the --repo option.")
        } else {
            msg
        };
        Self::Repository(enhanced_msg)
    }

    /// Create a branch resolution error
    pub fn branch_resolution(msg: impl Into<String>) -> Self {
        Self::BranchResolution(msg.into())
    }

    /// Create a job error
    pub fn job(msg: impl Into<String>) -> Self {
        Self::Job(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }
}

impl From<serde_json::Error> for MiningError {
    fn from(error: serde_json::Error) -> Self {
        Self::Export(error.to_string())
    }
}

/// Result type for mining operations
pub type MiningResult<T> = Result<T, MiningError>;
