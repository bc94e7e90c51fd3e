//! Domain layer for the attestation subsystem.

mod quote;
mod report_data;

pub use quote::*;
pub use report_data::*;
