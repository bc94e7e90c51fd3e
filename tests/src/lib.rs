//! # Enclave-Chain Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs         # shared builders (nodes, governance, blocks)
//!     ├── engine_flows.rs     # governance-backed engine round trips
//!     └── scenarios.rs        # end-to-end scenarios
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ec-tests
//! cargo test -p ec-tests integration::scenarios::
//! ```

#![allow(dead_code)]

pub mod integration;
