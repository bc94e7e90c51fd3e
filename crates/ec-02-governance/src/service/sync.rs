//! Periodic whitelist mirroring from an authoritative source.

use crate::domain::WhitelistManager;
use crate::ports::WhitelistSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pull the source every `interval` and replace the local table.
///
/// Returns when `stop` flips to `true` or its sender is dropped. A failed
/// fetch leaves the table untouched until the next tick.
pub async fn sync_whitelist_periodically(
    whitelist: Arc<WhitelistManager>,
    source: Arc<dyn WhitelistSource>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_ms = interval.as_millis() as u64, "[ec-02] whitelist sync started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.fetch_entries().await {
                    Ok(entries) => {
                        debug!(entries = entries.len(), "[ec-02] whitelist synced");
                        whitelist.replace_all(entries);
                        crate::metrics::set_whitelist_allowed(whitelist.allowed_entries().len());
                    }
                    Err(e) => {
                        warn!(kind = e.kind(), "[ec-02] whitelist sync failed: {}", e);
                        crate::metrics::record_error(e.kind());
                    }
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    info!("[ec-02] whitelist sync stopped");
}
