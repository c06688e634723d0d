//! Write-once attendance ledger.
//!
//! One entry per (identity, category) pair for the lifetime of the process;
//! the ledger is the sole source of truth for "has X been marked for Y".
//! Re-marking is a no-op, never an error.

use crate::category::Category;
use chrono::{DateTime, Local};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct AttendanceLedger {
    entries: HashMap<(String, Category), DateTime<Local>>,
}

impl AttendanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record attendance for (identity, category) at `at` unless an entry
    /// already exists. Returns whether an insertion occurred.
    pub fn try_mark(&mut self, identity: &str, category: Category, at: DateTime<Local>) -> bool {
        let key = (identity.to_string(), category);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, at);
        true
    }

    /// First-seen timestamp for (identity, category), if marked.
    pub fn marked_at(&self, identity: &str, category: Category) -> Option<DateTime<Local>> {
        self.entries.get(&(identity.to_string(), category)).copied()
    }

    /// Number of identities marked for `category`. Scans all entries; the
    /// ledger is small and mutation is rare, so no counter is maintained.
    pub fn count_for(&self, category: Category) -> usize {
        self.entries.keys().filter(|(_, c)| *c == category).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
