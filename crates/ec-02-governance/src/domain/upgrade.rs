//! Upgrade-mode rules.
//!
//! While two measurements are allowed at once the network is mid-upgrade.
//! New-version nodes stay read-only until the secret-data sync cursor
//! reaches the completion block, and only then start refusing old peers.

use crate::domain::whitelist::{EntryStatus, WhitelistManager};
use crate::error::{GovernanceError, GovernanceResult};
use parking_lot::RwLock;
use shared_types::Measurement;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct UpgradeState {
    upgrade_complete_block: Option<u64>,
    synced_block: u64,
}

pub struct UpgradeModeChecker {
    local_mr: Measurement,
    whitelist: Arc<WhitelistManager>,
    state: RwLock<UpgradeState>,
}

impl UpgradeModeChecker {
    pub fn new(local_mr: Measurement, whitelist: Arc<WhitelistManager>) -> Self {
        Self {
            local_mr,
            whitelist,
            state: RwLock::new(UpgradeState::default()),
        }
    }

    pub fn local_mr(&self) -> Measurement {
        self.local_mr
    }

    /// More than one allowed measurement.
    pub fn is_upgrade_in_progress(&self) -> bool {
        self.whitelist.allowed_entries().len() > 1
    }

    pub fn is_upgrade_complete(&self) -> bool {
        if self.whitelist.count_with_status(EntryStatus::Active) <= 1 {
            return true;
        }
        let state = self.state.read();
        matches!(state.upgrade_complete_block, Some(target) if state.synced_block >= target)
    }

    /// Local measurement is the most recently added active entry.
    ///
    /// An approved-but-not-active measurement never makes a node "new".
    pub fn is_new_version(&self) -> bool {
        self.whitelist
            .entries()
            .into_iter()
            .filter(|e| e.status == EntryStatus::Active)
            .max_by_key(|e| (e.added_at_block, e.version))
            .map(|e| e.mr_enclave == self.local_mr)
            .unwrap_or(false)
    }

    pub fn should_reject_write(&self) -> bool {
        self.is_upgrade_in_progress() && !self.is_upgrade_complete() && self.is_new_version()
    }

    /// `Err(UpgradeReadOnlyMode)` while writes must be refused.
    pub fn check_write(&self) -> GovernanceResult<()> {
        if self.should_reject_write() {
            debug!(mr_enclave = %self.local_mr, "[ec-02] write refused in upgrade mode");
            return Err(GovernanceError::UpgradeReadOnlyMode);
        }
        Ok(())
    }

    /// Refuse peers running a superseded measurement once switchover is done.
    pub fn should_reject_peer(&self, peer_mr: &Measurement) -> bool {
        *peer_mr != self.local_mr && self.is_upgrade_complete() && self.is_new_version()
    }

    pub fn set_upgrade_complete_block(&self, block: u64) {
        self.state.write().upgrade_complete_block = Some(block);
    }

    pub fn upgrade_complete_block(&self) -> Option<u64> {
        self.state.read().upgrade_complete_block
    }

    /// Advance the sync cursor. Never moves backwards.
    pub fn set_synced_block(&self, block: u64) {
        let mut state = self.state.write();
        state.synced_block = state.synced_block.max(block);
    }

    pub fn synced_block(&self) -> u64 {
        self.state.read().synced_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::whitelist::PermissionLevel;

    const OLD: Measurement = Measurement([1; 32]);
    const NEW: Measurement = Measurement([2; 32]);

    fn whitelist_mid_upgrade() -> Arc<WhitelistManager> {
        let wl = Arc::new(WhitelistManager::new());
        wl.insert(OLD, EntryStatus::Active, PermissionLevel::Full, 10, [0; 20]);
        wl.insert(NEW, EntryStatus::Active, PermissionLevel::Basic, 20, [0; 20]);
        wl
    }

    #[test]
    fn test_new_version_read_only_until_synced() {
        let checker = UpgradeModeChecker::new(NEW, whitelist_mid_upgrade());
        checker.set_upgrade_complete_block(100);

        assert!(checker.is_upgrade_in_progress());
        assert!(checker.is_new_version());
        assert_eq!(checker.check_write(), Err(GovernanceError::UpgradeReadOnlyMode));
        assert!(!checker.should_reject_peer(&OLD));

        checker.set_synced_block(100);

        assert!(checker.check_write().is_ok());
        assert!(checker.should_reject_peer(&OLD));
        assert!(!checker.should_reject_peer(&NEW));
    }

    #[test]
    fn test_old_version_keeps_writing() {
        let checker = UpgradeModeChecker::new(OLD, whitelist_mid_upgrade());
        assert!(!checker.is_new_version());
        assert!(checker.check_write().is_ok());
        assert!(!checker.should_reject_peer(&NEW));
    }

    #[test]
    fn test_single_entry_is_complete() {
        let wl = Arc::new(WhitelistManager::new());
        wl.insert(OLD, EntryStatus::Active, PermissionLevel::Full, 10, [0; 20]);
        let checker = UpgradeModeChecker::new(OLD, wl);
        assert!(!checker.is_upgrade_in_progress());
        assert!(checker.is_upgrade_complete());
    }

    #[test]
    fn test_approved_measurement_is_not_new_version() {
        let wl = Arc::new(WhitelistManager::new());
        wl.insert(OLD, EntryStatus::Active, PermissionLevel::Full, 10, [0; 20]);
        wl.insert(NEW, EntryStatus::Approved, PermissionLevel::Basic, 20, [0; 20]);
        let checker = UpgradeModeChecker::new(NEW, wl);

        assert!(!checker.is_new_version());
        assert!(checker.check_write().is_ok());
        assert!(!checker.should_reject_peer(&OLD));
    }

    #[test]
    fn test_synced_block_monotonic() {
        let checker = UpgradeModeChecker::new(NEW, whitelist_mid_upgrade());
        checker.set_synced_block(50);
        checker.set_synced_block(10);
        assert_eq!(checker.synced_block(), 50);
    }
}
