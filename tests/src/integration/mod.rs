//! Cross-crate flows: attestation → governance → consensus.

pub mod fixtures;

#[cfg(test)]
mod engine_flows;
#[cfg(test)]
mod scenarios;
