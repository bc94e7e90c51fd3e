//! Ports for the governance subsystem.

mod outbound;

pub use outbound::*;
