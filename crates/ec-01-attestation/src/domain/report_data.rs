//! Report-data layout.
//!
//! `[0..32]` binding hash, `[32..52]` producer address, `[52..64]` zero.

use shared_types::{Address, Hash};

/// The 64-byte payload an enclave commits to inside its quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportData {
    pub binding: Hash,
    pub producer: Address,
}

impl ReportData {
    pub fn new(binding: Hash, producer: Address) -> Self {
        Self { binding, producer }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.binding);
        out[32..52].copy_from_slice(&self.producer);
        out
    }

    /// Lenient decode: trailing bytes are ignored.
    pub fn from_bytes(raw: &[u8; 64]) -> Self {
        let mut binding = [0u8; 32];
        binding.copy_from_slice(&raw[..32]);
        let mut producer = [0u8; 20];
        producer.copy_from_slice(&raw[32..52]);
        Self { binding, producer }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let rd = ReportData::new([7; 32], [9; 20]);
        let raw = rd.to_bytes();
        assert_eq!(&raw[..32], &[7; 32]);
        assert_eq!(&raw[32..52], &[9; 20]);
        assert_eq!(&raw[52..], &[0; 12]);
        assert_eq!(ReportData::from_bytes(&raw), rd);
    }
}
