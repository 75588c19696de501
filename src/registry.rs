//! Identifier Registry
//!
//! Append-only, thread-safe mapping between domain values (author identities,
//! file paths, commit hashes) and compact integer ids. Ids are allocated on
//! first reference, start at [`BASE_ID`] and are never reused or removed for
//! the lifetime of a run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

/// First id handed out by every registry
pub const BASE_ID: u32 = 0;

/// Bidirectional value <-> id table safe for concurrent `add` calls
#[derive(Debug)]
pub struct IdentifierRegistry {
    value_to_id: DashMap<String, u32>,
    id_to_value: RwLock<Vec<String>>,
    next_id: AtomicU32,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self {
            value_to_id: DashMap::new(),
            id_to_value: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(BASE_ID),
        }
    }

    /// Return the id of `value`, allocating the next one if it was never seen.
    pub fn add(&self, value: &str) -> u32 {
        if let Some(id) = self.value_to_id.get(value) {
            return *id;
        }

        // The entry lock serializes racing allocations for the same value.
        *self.value_to_id.entry(value.to_string()).or_insert_with(|| {
            let mut values = self.id_to_value.write();
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            debug_assert_eq!((id - BASE_ID) as usize, values.len());
            values.push(value.to_string());
            id
        })
    }

    pub fn lookup_id(&self, value: &str) -> Option<u32> {
        self.value_to_id.get(value).map(|id| *id)
    }

    pub fn lookup_value(&self, id: u32) -> Option<String> {
        let index = id.checked_sub(BASE_ID)? as usize;
        self.id_to_value.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.id_to_value.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered id -> value snapshot, used by exporters.
    pub fn id_to_value(&self) -> BTreeMap<u32, String> {
        self.id_to_value
            .read()
            .iter()
            .enumerate()
            .map(|(index, value)| (index as u32 + BASE_ID, value.clone()))
            .collect()
    }
}

impl Default for IdentifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The three registries every miner shares during a run
#[derive(Debug, Default)]
pub struct Mappers {
    pub users: IdentifierRegistry,
    pub files: IdentifierRegistry,
    pub commits: IdentifierRegistry,
}

impl Mappers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_name(&self, id: u32) -> String {
        self.users.lookup_value(id).unwrap_or_else(|| format!("user: {}", id))
    }

    pub fn file_path(&self, id: u32) -> String {
        self.files.lookup_value(id).unwrap_or_else(|| format!("file: {}", id))
    }

    pub fn commit_hash(&self, id: u32) -> String {
        self.commits.lookup_value(id).unwrap_or_else(|| format!("commit: {}", id))
    }
}
