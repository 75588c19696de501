//! Metric miners
//!
//! Each miner is the per-unit extraction step of one metric; the engine
//! supplies the units and the processor does the accumulation.

pub mod churn;
pub mod co_edit;
pub mod coordination;
pub mod ownership;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::engine::WorkUnit;
use crate::error::{MiningError, MiningResult};
use crate::git::Commit;

pub use churn::ChurnMiner;
pub use co_edit::CoEditMiner;
pub use coordination::CoordinationMiner;
pub use ownership::OwnershipMiner;

/// The available miners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MinerKind {
    /// Modified lines or files per period and file
    Churn,
    /// Recency-weighted share of authored lines per developer and file
    Ownership,
    /// Edits of every mined commit pair and file co-edit counts
    CoEdit,
    /// Coordination needs between developers
    Coordination,
}

impl MinerKind {
    pub const ALL: [MinerKind; 4] = [
        MinerKind::Churn,
        MinerKind::Ownership,
        MinerKind::CoEdit,
        MinerKind::Coordination,
    ];

    /// Name used on the command line and for output files
    pub fn name(&self) -> &'static str {
        match self {
            MinerKind::Churn => "churn",
            MinerKind::Ownership => "ownership",
            MinerKind::CoEdit => "co-edit",
            MinerKind::Coordination => "coordination",
        }
    }
}

impl fmt::Display for MinerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MinerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        MinerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized || kind.name().replace('-', "") == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown miner: {}. Valid options: churn, ownership, co-edit, coordination",
                    s
                )
            })
    }
}

/// The `(older, newer)` commits of a pairwise unit
pub(crate) fn expect_pair<'a>(miner: &str, unit: &'a WorkUnit) -> MiningResult<(&'a Commit, &'a Commit)> {
    match unit {
        WorkUnit::Pair { older, newer, .. } => Ok((older, newer)),
        WorkUnit::Periodized { .. } => Err(MiningError::job(format!(
            "{} mines commit pairs, got a periodized unit",
            miner
        ))),
    }
}

/// Seconds since the epoch to days since the epoch
pub(crate) fn epoch_day(timestamp: i64) -> i64 {
    timestamp.div_euclid(crate::processors::ownership::SECONDS_PER_DAY)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miner_kind_parsing() {
        assert_eq!("churn".parse::<MinerKind>().unwrap(), MinerKind::Churn);
        assert_eq!("Co-Edit".parse::<MinerKind>().unwrap(), MinerKind::CoEdit);
        assert_eq!("co_edit".parse::<MinerKind>().unwrap(), MinerKind::CoEdit);
        assert_eq!("coedit".parse::<MinerKind>().unwrap(), MinerKind::CoEdit);
        assert!("blame".parse::<MinerKind>().is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for kind in MinerKind::ALL {
            assert_eq!(kind.to_string().parse::<MinerKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_epoch_day() {
        assert_eq!(epoch_day(0), 0);
        assert_eq!(epoch_day(86_399), 0);
        assert_eq!(epoch_day(86_400), 1);
        assert_eq!(epoch_day(-1), -1);
    }
}
