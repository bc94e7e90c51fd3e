//! Concrete adapters for governance ports and persistence.

mod memory;
mod snapshot;

pub use memory::InMemoryWhitelistSource;
pub use snapshot::{load_snapshot, save_snapshot};
