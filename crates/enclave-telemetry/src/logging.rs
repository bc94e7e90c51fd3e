//! Structured logging helpers.
//!
//! Every line carries the subsystem tag (`ec-01`, `ec-02`, `ec-03`) so
//! attestation, governance and consensus output can be filtered apart.

/// Subsystem tag for the attestation crate.
pub const SUBSYSTEM_ATTESTATION: &str = "ec-01";
/// Subsystem tag for the governance crate.
pub const SUBSYSTEM_GOVERNANCE: &str = "ec-02";
/// Subsystem tag for the consensus crate.
pub const SUBSYSTEM_CONSENSUS: &str = "ec-03";

/// Emit a structured log entry tagged with a subsystem.
#[macro_export]
macro_rules! log_event {
    (info, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
    (warn, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
    (error, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
    (debug, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
}

/// Log a block-related event with standard fields.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $subsystem:expr, $msg:expr, $block_height:expr, $block_hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            block_height = $block_height,
            block_hash = %$block_hash,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a governance proposal event with standard fields.
#[macro_export]
macro_rules! log_proposal_event {
    ($level:ident, $msg:expr, $proposal_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $crate::logging::SUBSYSTEM_GOVERNANCE,
            proposal_id = %$proposal_id,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_expand_without_subscriber() {
        crate::log_event!(info, SUBSYSTEM_CONSENSUS, "tick", height = 3u64);
        crate::log_block_event!(debug, SUBSYSTEM_CONSENSUS, "sealed", 7u64, "0xabc");
        crate::log_proposal_event!(warn, "rejected", "0x01", reason = "veto");
    }
}
