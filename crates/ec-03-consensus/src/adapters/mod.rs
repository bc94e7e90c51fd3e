//! In-process implementations of the host ports.

pub mod clock;
pub mod gate;
pub mod memory;

pub use clock::ManualClock;
pub use gate::{ChannelWorkTrigger, StaticWriteGate};
pub use memory::{FixedNetworkStats, InMemoryChain, InMemoryMempool, InMemoryState};
