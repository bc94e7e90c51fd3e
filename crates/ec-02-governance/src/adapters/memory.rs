//! In-memory whitelist source.

use crate::domain::WhitelistEntry;
use crate::error::GovernanceResult;
use crate::ports::WhitelistSource;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Whitelist source backed by a settable list. Used by devnets and tests.
#[derive(Default)]
pub struct InMemoryWhitelistSource {
    entries: RwLock<Vec<WhitelistEntry>>,
}

impl InMemoryWhitelistSource {
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn set_entries(&self, entries: Vec<WhitelistEntry>) {
        *self.entries.write() = entries;
    }
}

#[async_trait]
impl WhitelistSource for InMemoryWhitelistSource {
    async fn fetch_entries(&self) -> GovernanceResult<Vec<WhitelistEntry>> {
        Ok(self.entries.read().clone())
    }
}
