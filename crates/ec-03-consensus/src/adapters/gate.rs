//! Write gating and work triggering.

use crate::ports::{WorkTrigger, WriteGate};
use ec_02_governance::{GovernanceFacade, UpgradeModeChecker};
use shared_types::BlockHeader;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::warn;

impl WriteGate for UpgradeModeChecker {
    fn is_read_only(&self) -> bool {
        self.should_reject_write()
    }
}

impl WriteGate for GovernanceFacade {
    fn is_read_only(&self) -> bool {
        self.upgrade().should_reject_write()
    }
}

/// Gate toggled by hand.
#[derive(Debug, Default)]
pub struct StaticWriteGate {
    read_only: AtomicBool,
}

impl StaticWriteGate {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only: AtomicBool::new(read_only),
        }
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl WriteGate for StaticWriteGate {
    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}

/// Forwards work requests to a channel the host miner drains.
pub struct ChannelWorkTrigger {
    tx: mpsc::UnboundedSender<BlockHeader>,
}

impl ChannelWorkTrigger {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BlockHeader>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WorkTrigger for ChannelWorkTrigger {
    fn trigger_work(&self, parent: &BlockHeader) {
        if self.tx.send(parent.clone()).is_err() {
            warn!(block_height = parent.number, "[ec-03] work trigger receiver dropped");
        }
    }
}
