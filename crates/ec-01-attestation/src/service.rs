//! Verification helpers composed over the ports.

use crate::domain::{DcapQuote, ReportData};
use crate::error::{AttestationError, AttestationResult};
use crate::ports::{MeasurementPolicy, QuoteVerifier};
use shared_types::{HardwareId, Measurement};
use std::time::Duration;
use tracing::warn;

/// Fields of a quote that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedQuote {
    pub measurement: Measurement,
    pub mr_signer: Measurement,
    pub report_data: ReportData,
    pub hardware_id: HardwareId,
}

/// Run `verify_quote` under a deadline.
///
/// A timeout surfaces as [`AttestationError::Timeout`], which is a
/// `quote_verification_failed` kind.
pub async fn verify_with_timeout(
    verifier: &dyn QuoteVerifier,
    quote: &[u8],
    timeout: Duration,
) -> AttestationResult<()> {
    match tokio::time::timeout(timeout, verifier.verify_quote(quote)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "[ec-01] quote verification timed out");
            Err(AttestationError::Timeout(timeout.as_millis() as u64))
        }
    }
}

/// Verify under a deadline, then read out the typed fields.
pub async fn verify_and_extract(
    verifier: &dyn QuoteVerifier,
    quote: &[u8],
    timeout: Duration,
) -> AttestationResult<VerifiedQuote> {
    verify_with_timeout(verifier, quote, timeout).await?;
    let parsed = DcapQuote::parse(quote)?;
    Ok(VerifiedQuote {
        measurement: verifier.extract_measurement(quote)?,
        mr_signer: parsed.mr_signer(),
        report_data: ReportData::from_bytes(&verifier.extract_report_data(quote)?),
        hardware_id: verifier.extract_hardware_id(quote)?,
    })
}

/// Check a measurement against a policy.
pub fn ensure_allowed(
    policy: &dyn MeasurementPolicy,
    measurement: &Measurement,
) -> AttestationResult<()> {
    if policy.is_allowed(measurement) {
        Ok(())
    } else {
        Err(AttestationError::MeasurementNotAllowed(*measurement))
    }
}
