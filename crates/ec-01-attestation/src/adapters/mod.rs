//! Adapters for the attestation subsystem.

mod custody;
mod gramine;
mod policy;
mod software;

pub use custody::InMemoryKeyCustody;
pub use gramine::{GramineAttestor, DEFAULT_ATTESTATION_ROOT};
pub use policy::StaticMeasurementPolicy;
pub use software::{SoftwareAttestor, SoftwareQuoteVerifier};
