//! MRENCLAVE whitelist.
//!
//! External callers only read; mutations come from the proposal executor,
//! the bootstrap hand-off, the registry sync and snapshot restore.

use ec_01_attestation::MeasurementPolicy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Measurement};
use std::collections::HashMap;

/// Lifecycle of a whitelisted measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Approved,
    Active,
    Deprecated,
    Rejected,
}

impl EntryStatus {
    /// Approved and active measurements may produce blocks.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }
}

/// What a measurement's enclaves may do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    #[default]
    Basic,
    Standard,
    Full,
}

impl PermissionLevel {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Basic),
            1 => Some(Self::Standard),
            2 => Some(Self::Full),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub mr_enclave: Measurement,
    pub version: u32,
    pub status: EntryStatus,
    pub permission_level: PermissionLevel,
    pub added_at_block: u64,
    pub added_by: Address,
}

/// Measurement → entry table.
#[derive(Default)]
pub struct WhitelistManager {
    entries: RwLock<HashMap<Measurement, WhitelistEntry>>,
}

impl WhitelistManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_allowed(&self, mr: &Measurement) -> bool {
        self.entries
            .read()
            .get(mr)
            .map(|e| e.status.is_allowed())
            .unwrap_or(false)
    }

    pub fn contains(&self, mr: &Measurement) -> bool {
        self.entries.read().contains_key(mr)
    }

    pub fn get_entry(&self, mr: &Measurement) -> Option<WhitelistEntry> {
        self.entries.read().get(mr).cloned()
    }

    /// `Basic` when absent.
    pub fn get_permission_level(&self, mr: &Measurement) -> PermissionLevel {
        self.entries
            .read()
            .get(mr)
            .map(|e| e.permission_level)
            .unwrap_or_default()
    }

    /// All entries, ordered by `added_at_block` then measurement.
    pub fn entries(&self) -> Vec<WhitelistEntry> {
        let mut out: Vec<_> = self.entries.read().values().cloned().collect();
        out.sort_by(|a, b| {
            a.added_at_block
                .cmp(&b.added_at_block)
                .then(a.mr_enclave.cmp(&b.mr_enclave))
        });
        out
    }

    pub fn allowed_entries(&self) -> Vec<WhitelistEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.status.is_allowed())
            .collect()
    }

    pub fn count_with_status(&self, status: EntryStatus) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn next_version(entries: &HashMap<Measurement, WhitelistEntry>) -> u32 {
        entries.values().map(|e| e.version).max().unwrap_or(0) + 1
    }

    pub(crate) fn insert(
        &self,
        mr: Measurement,
        status: EntryStatus,
        permission_level: PermissionLevel,
        added_at_block: u64,
        added_by: Address,
    ) -> WhitelistEntry {
        let mut entries = self.entries.write();
        let version = entries
            .get(&mr)
            .map(|e| e.version)
            .unwrap_or_else(|| Self::next_version(&entries));
        let entry = WhitelistEntry {
            mr_enclave: mr,
            version,
            status,
            permission_level,
            added_at_block,
            added_by,
        };
        entries.insert(mr, entry.clone());
        entry
    }

    pub(crate) fn set_status(&self, mr: &Measurement, status: EntryStatus) -> bool {
        match self.entries.write().get_mut(mr) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_permission_level(&self, mr: &Measurement, level: PermissionLevel) -> bool {
        match self.entries.write().get_mut(mr) {
            Some(entry) => {
                entry.permission_level = level;
                true
            }
            None => false,
        }
    }

    /// Deprecate every active entry except `keep`. Returns how many changed.
    pub(crate) fn deprecate_active_except(&self, keep: &Measurement) -> usize {
        let mut changed = 0;
        for entry in self.entries.write().values_mut() {
            if entry.mr_enclave != *keep && entry.status == EntryStatus::Active {
                entry.status = EntryStatus::Deprecated;
                changed += 1;
            }
        }
        changed
    }

    /// Replace the whole table. Used for genesis seeding and registry sync.
    pub fn replace_all(&self, entries: Vec<WhitelistEntry>) {
        let table = entries.into_iter().map(|e| (e.mr_enclave, e)).collect();
        *self.entries.write() = table;
    }
}

impl MeasurementPolicy for WhitelistManager {
    fn is_allowed(&self, measurement: &Measurement) -> bool {
        WhitelistManager::is_allowed(self, measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mr(b: u8) -> Measurement {
        Measurement([b; 32])
    }

    #[test]
    fn test_allowed_statuses() {
        let wl = WhitelistManager::new();
        wl.insert(mr(1), EntryStatus::Approved, PermissionLevel::Basic, 1, [0; 20]);
        wl.insert(mr(2), EntryStatus::Active, PermissionLevel::Full, 2, [0; 20]);
        wl.insert(mr(3), EntryStatus::Pending, PermissionLevel::Basic, 3, [0; 20]);
        wl.insert(mr(4), EntryStatus::Deprecated, PermissionLevel::Basic, 4, [0; 20]);

        assert!(wl.is_allowed(&mr(1)));
        assert!(wl.is_allowed(&mr(2)));
        assert!(!wl.is_allowed(&mr(3)));
        assert!(!wl.is_allowed(&mr(4)));
        assert!(!wl.is_allowed(&mr(5)));
        assert_eq!(wl.allowed_entries().len(), 2);
    }

    #[test]
    fn test_permission_defaults_to_basic() {
        let wl = WhitelistManager::new();
        assert_eq!(wl.get_permission_level(&mr(9)), PermissionLevel::Basic);
        wl.insert(mr(9), EntryStatus::Active, PermissionLevel::Standard, 0, [0; 20]);
        assert_eq!(wl.get_permission_level(&mr(9)), PermissionLevel::Standard);
    }

    #[test]
    fn test_versions_increase_and_survive_reinsert() {
        let wl = WhitelistManager::new();
        let a = wl.insert(mr(1), EntryStatus::Approved, PermissionLevel::Basic, 1, [0; 20]);
        let b = wl.insert(mr(2), EntryStatus::Approved, PermissionLevel::Basic, 2, [0; 20]);
        let a2 = wl.insert(mr(1), EntryStatus::Active, PermissionLevel::Full, 3, [0; 20]);
        assert_eq!(a.version, 1);
        assert_eq!(b.version, 2);
        assert_eq!(a2.version, 1);
    }

    #[test]
    fn test_deprecate_active_except() {
        let wl = WhitelistManager::new();
        wl.insert(mr(1), EntryStatus::Active, PermissionLevel::Full, 1, [0; 20]);
        wl.insert(mr(2), EntryStatus::Active, PermissionLevel::Full, 2, [0; 20]);
        wl.insert(mr(3), EntryStatus::Approved, PermissionLevel::Basic, 3, [0; 20]);

        assert_eq!(wl.deprecate_active_except(&mr(2)), 1);
        assert_eq!(wl.get_entry(&mr(1)).unwrap().status, EntryStatus::Deprecated);
        assert_eq!(wl.get_entry(&mr(3)).unwrap().status, EntryStatus::Approved);
    }

    #[test]
    fn test_returned_entries_are_copies() {
        let wl = WhitelistManager::new();
        wl.insert(mr(1), EntryStatus::Active, PermissionLevel::Full, 1, [0; 20]);
        let mut copy = wl.get_entry(&mr(1)).unwrap();
        copy.status = EntryStatus::Rejected;
        assert!(wl.is_allowed(&mr(1)));
    }
}
