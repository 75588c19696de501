//! gminer: concurrent git history mining
//!
//! A [`engine::MiningEngine`] walks the commit pairs of the selected branches
//! on a pool of worker threads, hands each pair to a [`engine::Miner`] and
//! collects the extracted facts in a [`processors::DataProcessor`].

pub mod app;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod export;
pub mod git;
pub mod logging;
pub mod metrics;
pub mod miners;
pub mod period;
pub mod processors;
pub mod registry;

pub use engine::{EngineConfig, Miner, MiningContext, MiningEngine, MiningMode, MiningRun, RunStats, WorkUnit};
pub use error::{MiningError, MiningResult};
pub use miners::MinerKind;
pub use registry::{IdentifierRegistry, Mappers};
