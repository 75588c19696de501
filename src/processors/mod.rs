//! Data Processors
//!
//! A processor receives facts from many worker threads at once through
//! [`DataProcessor::process_data`] and turns the raw accumulations into the
//! final metric in a single [`DataProcessor::calculate`] call after every
//! worker has finished.

pub mod churn;
pub mod co_edit;
pub mod coordination;
pub mod ownership;

use std::sync::OnceLock;

use log::warn;
use serde::Serialize;

pub use churn::{ChurnMode, ChurnOutput, ChurnProcessor, FileModification};
pub use co_edit::{CoEditOutput, CoEditProcessor, CommitCoEdits, CommitInfoEncoded, EditData, FileAdjacency};
pub use coordination::{CommitContribution, CoordinationNeed, CoordinationOutput, CoordinationProcessor};
pub use ownership::{AuthoredLines, OwnershipOutput, OwnershipProcessor};

/// Thread-safe accumulator for one metric
pub trait DataProcessor: Send + Sync + 'static {
    /// Unit of data emitted by a miner
    type Fact;
    /// Finalized result
    type Output: Serialize;

    fn name(&self) -> &'static str;

    /// Record one fact. Called concurrently from worker threads.
    fn process_data(&self, fact: Self::Fact);

    /// Derive the final result from the accumulated facts. Called once, after
    /// all producers have joined; later calls are ignored.
    fn calculate(&self);

    /// The finalized result, `None` until [`DataProcessor::calculate`] ran.
    fn output(&self) -> Option<&Self::Output>;
}

/// Write-once slot holding a processor's finalized output
#[derive(Debug)]
pub(crate) struct Calculated<T> {
    slot: OnceLock<T>,
}

impl<T> Calculated<T> {
    pub(crate) fn new() -> Self {
        Self { slot: OnceLock::new() }
    }

    pub(crate) fn finalize(&self, processor: &str, calculate: impl FnOnce() -> T) {
        if self.slot.get().is_some() {
            warn!("{} results were already calculated, ignoring repeated calculate()", processor);
            return;
        }
        if self.slot.set(calculate()).is_err() {
            warn!("{} results were calculated concurrently, keeping the first", processor);
        }
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.slot.get()
    }
}

impl<T> Default for Calculated<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum floats in ascending order so the total does not depend on the order
/// the terms were produced in.
pub(crate) fn stable_sum(mut terms: Vec<f64>) -> f64 {
    terms.sort_by(|a, b| a.total_cmp(b));
    terms.into_iter().sum()
}
