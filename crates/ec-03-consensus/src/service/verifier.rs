//! Header verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! | # | Check | Error kind |
//! |---|-------|------------|
//! | 1 | `time <= now + max_future` | `future_block` |
//! | 2 | parent exists | `unknown_ancestor` |
//! | 3 | `time > parent.time` | `invalid_timestamp` |
//! | 4 | `difficulty == 1` | `invalid_difficulty` |
//! | 5 | extra length in bounds | `invalid_extra` |
//! | 6 | extra decodes | `invalid_extra` |
//! | 7 | quote verifies (under timeout) | `quote_verification_failed` |
//! | 8 | measurement allowed | `MR_not_allowed` |
//! | 9 | quote producer == extra producer | `invalid_producer_id` |
//! | 10 | `abs(now - attestation_ts) <= max_age` | `attestation_too_old` |
//! | 11 | seal signature recovers to producer | `invalid_signature` |
//! | 12 | `report_data[0..32] == parent_hash` | `quote_user_data_mismatch` |

use crate::config::BasicConfig;
use crate::domain::extra::{decode_header_extra, seal_hash};
use crate::error::{ConsensusError, ConsensusResult};
use crate::metrics;
use crate::ports::{ChainReader, TimeSource};
use ec_01_attestation::{verify_with_timeout, MeasurementPolicy, QuoteVerifier, ReportData};
use shared_types::BlockHeader;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HeaderVerifier<V: QuoteVerifier> {
    config: BasicConfig,
    quote_verifier: Arc<V>,
    policy: Arc<dyn MeasurementPolicy>,
    clock: Arc<dyn TimeSource>,
}

impl<V: QuoteVerifier> HeaderVerifier<V> {
    pub fn new(
        config: BasicConfig,
        quote_verifier: Arc<V>,
        policy: Arc<dyn MeasurementPolicy>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            quote_verifier,
            policy,
            clock,
        }
    }

    pub fn quote_verifier(&self) -> &Arc<V> {
        &self.quote_verifier
    }

    /// Verify against the chain; `parent` short-circuits the lookup when the
    /// caller already holds it (batch verification).
    pub async fn verify(
        &self,
        chain: &dyn ChainReader,
        header: &BlockHeader,
        parent: Option<&BlockHeader>,
    ) -> ConsensusResult<()> {
        let result = self.run_checks(chain, header, parent).await;
        match &result {
            Ok(()) => {
                metrics::record_verified();
                debug!(block_height = header.number, "[ec-03] header verified");
            }
            Err(e) => {
                metrics::record_rejected(e.kind());
                debug!(block_height = header.number, kind = e.kind(), "[ec-03] header rejected: {}", e);
            }
        }
        result
    }

    async fn run_checks(
        &self,
        chain: &dyn ChainReader,
        header: &BlockHeader,
        parent: Option<&BlockHeader>,
    ) -> ConsensusResult<()> {
        let now = self.clock.now_secs();

        // 1
        if header.timestamp > now.saturating_add(self.config.max_future_secs) {
            return Err(ConsensusError::FutureBlock {
                timestamp: header.timestamp,
                now,
            });
        }

        // 2
        if header.number == 0 {
            return Err(ConsensusError::InvalidHeader("genesis is not verified".into()));
        }
        let parent = match parent {
            Some(p) if p.number + 1 == header.number && p.hash() == header.parent_hash => p.clone(),
            _ => chain
                .header_by_hash(&header.parent_hash, header.number - 1)
                .ok_or(ConsensusError::UnknownAncestor(header.parent_hash))?,
        };

        // 3
        if header.timestamp <= parent.timestamp {
            return Err(ConsensusError::InvalidTimestamp {
                block: header.timestamp,
                parent: parent.timestamp,
            });
        }

        // 4
        if header.difficulty != 1 {
            return Err(ConsensusError::InvalidDifficulty(header.difficulty));
        }

        // 5, 6
        let extra = decode_header_extra(header)?;

        // 7
        {
            let _timer = metrics::quote_verification_timer();
            let timeout = Duration::from_millis(self.config.verify_timeout_ms);
            verify_with_timeout(self.quote_verifier.as_ref(), &extra.quote, timeout)
                .await
                .map_err(|e| ConsensusError::QuoteVerificationFailed(e.to_string()))?;
        }

        // 8
        let measurement = self.quote_verifier.extract_measurement(&extra.quote)?;
        if !self.policy.is_allowed(&measurement) {
            return Err(ConsensusError::MrNotAllowed(measurement));
        }

        // 9
        let report_data = ReportData::from_bytes(&self.quote_verifier.extract_report_data(&extra.quote)?);
        if report_data.producer != extra.producer_id {
            return Err(ConsensusError::InvalidProducerId {
                claimed: extra.producer_id,
                actual: report_data.producer,
            });
        }

        // 10
        if now.abs_diff(extra.attestation_ts) > self.config.max_attestation_age_secs {
            return Err(ConsensusError::AttestationTooOld {
                attestation_ts: extra.attestation_ts,
                now,
            });
        }

        // 11
        if !extra.is_sealed() {
            return Err(ConsensusError::InvalidSignature("header is not sealed".into()));
        }
        let hash = seal_hash(header)?;
        let signer = shared_crypto::recover_address(&hash, &extra.signature)
            .map_err(|e| ConsensusError::InvalidSignature(e.to_string()))?;
        if signer != extra.producer_id {
            return Err(ConsensusError::InvalidSignature(format!(
                "seal signed by 0x{}, producer is 0x{}",
                hex::encode(signer),
                hex::encode(extra.producer_id)
            )));
        }

        // 12
        if report_data.binding != header.parent_hash {
            if self.config.enforce_user_data {
                return Err(ConsensusError::QuoteUserDataMismatch);
            }
            warn!(
                block_height = header.number,
                "[ec-03] quote does not bind the parent hash; accepted because enforce_user_data is off"
            );
        }

        Ok(())
    }
}
