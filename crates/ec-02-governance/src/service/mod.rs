//! Governance services composed over the domain tables.

pub mod executor;
pub mod facade;
pub mod policy;
pub mod sync;

pub use executor::GovernanceExecutor;
pub use facade::GovernanceFacade;
pub use policy::GovernancePolicy;
pub use sync::sync_whitelist_periodically;
