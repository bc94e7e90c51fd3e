//! JSON whitelist snapshots.

use crate::domain::{WhitelistEntry, WhitelistManager};
use crate::error::{GovernanceError, GovernanceResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct WhitelistSnapshot {
    version: u32,
    entries: Vec<WhitelistEntry>,
}

/// Write every whitelist entry to `path`.
pub fn save_snapshot(whitelist: &WhitelistManager, path: &Path) -> GovernanceResult<usize> {
    let snapshot = WhitelistSnapshot {
        version: SNAPSHOT_VERSION,
        entries: whitelist.entries(),
    };
    let file = File::create(path).map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &snapshot)
        .map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
    writer
        .flush()
        .map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
    info!(
        path = %path.display(),
        entries = snapshot.entries.len(),
        "[ec-02] whitelist snapshot saved"
    );
    Ok(snapshot.entries.len())
}

/// Replace the whitelist with the snapshot at `path`.
pub fn load_snapshot(whitelist: &WhitelistManager, path: &Path) -> GovernanceResult<usize> {
    let file = File::open(path).map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
    let snapshot: WhitelistSnapshot = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| GovernanceError::Snapshot(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(GovernanceError::Snapshot(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    let count = snapshot.entries.len();
    whitelist.replace_all(snapshot.entries);
    info!(path = %path.display(), entries = count, "[ec-02] whitelist snapshot loaded");
    Ok(count)
}
