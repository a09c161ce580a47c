//! # Payload Builder
//!
//! [`PayloadBuilder`] turns a [`PreparedDocument`] into the exact bytes an
//! authority expects. Builders are pure: they read no clock, no storage and
//! no network, so the same document and configuration always produce the
//! same bytes and the same digest.
//!
//! Before serializing, every builder runs the shared [`preflight`] checks
//! and reconciles the header totals it is about to emit against the sum of
//! the line amounts it emitted. Any mismatch aborts with
//! [`PayloadError::Consistency`].

use fisc_core::{Authority, DocumentKind, FiscalConfig, SequenceNumber};
use fisc_tax::DocumentTotals;

use crate::error::PayloadError;
use crate::etims::EtimsBuilder;
use crate::evat::EvatBuilder;
use crate::payload::{Payload, PreparedDocument};

/// Builds the wire payload for one authority.
pub trait PayloadBuilder: Send + Sync {
    /// The authority whose format this builder produces.
    fn authority(&self) -> Authority;

    /// Build the payload.
    fn build(&self, doc: &PreparedDocument, config: &FiscalConfig) -> Result<Payload, PayloadError>;
}

/// The builder for an authority.
pub fn builder_for(authority: Authority) -> &'static dyn PayloadBuilder {
    match authority {
        Authority::KraEtims => &EtimsBuilder,
        Authority::GraEvat => &EvatBuilder,
    }
}

/// Build a payload with the builder selected by the configuration.
pub fn build(doc: &PreparedDocument, config: &FiscalConfig) -> Result<Payload, PayloadError> {
    builder_for(config.authority).build(doc, config)
}

/// Checks shared by every builder. Returns the original sequence number
/// for credit notes.
pub(crate) fn preflight(
    doc: &PreparedDocument,
    config: &FiscalConfig,
    authority: Authority,
) -> Result<Option<SequenceNumber>, PayloadError> {
    let mismatch = |field: &str, document: String, config: String| PayloadError::ConfigMismatch {
        field: field.to_string(),
        document,
        config,
    };
    if config.authority != authority {
        return Err(mismatch(
            "authority",
            authority.to_string(),
            config.authority.to_string(),
        ));
    }
    if doc.draft.taxpayer != config.taxpayer {
        return Err(mismatch(
            "taxpayer",
            doc.draft.taxpayer.to_string(),
            config.taxpayer.to_string(),
        ));
    }
    if doc.draft.branch != config.branch {
        return Err(mismatch(
            "branch",
            doc.draft.branch.to_string(),
            config.branch.to_string(),
        ));
    }
    if let Some(line) = doc
        .mapped
        .lines
        .iter()
        .find(|l| l.code.authority() != authority)
    {
        return Err(mismatch(
            "tax scheme",
            format!("line {} {}", line.seq, line.code),
            authority.to_string(),
        ));
    }
    if doc.mapped.lines.len() != doc.draft.lines.len() {
        return Err(PayloadError::Consistency {
            field: "line count".into(),
            expected: doc.draft.lines.len() as i64,
            actual: doc.mapped.lines.len() as i64,
        });
    }

    for line in &doc.mapped.lines {
        let expected = line.taxable + line.tax + line.levy_total();
        reconcile(&format!("line {} total", line.seq), expected, line.total)?;
    }
    let recomputed = DocumentTotals::from_lines(&doc.mapped.lines).map_err(|_| {
        PayloadError::Consistency {
            field: "totals".into(),
            expected: 0,
            actual: doc.mapped.totals.total,
        }
    })?;
    reconcile("taxable", recomputed.taxable, doc.mapped.totals.taxable)?;
    reconcile("tax", recomputed.tax, doc.mapped.totals.tax)?;
    reconcile("levy", recomputed.levy, doc.mapped.totals.levy)?;
    reconcile("total", recomputed.total, doc.mapped.totals.total)?;

    match doc.draft.kind {
        DocumentKind::Sale => Ok(None),
        DocumentKind::CreditNote => {
            if doc.draft.credit_reason.is_none() {
                return Err(PayloadError::MissingReason {
                    reference: doc.draft.reference.clone(),
                });
            }
            doc.original_sequence
                .map(Some)
                .ok_or_else(|| PayloadError::MissingOriginal {
                    reference: doc.draft.reference.clone(),
                })
        }
    }
}

/// Fail with [`PayloadError::Consistency`] unless `expected == actual`.
pub(crate) fn reconcile(field: &str, expected: i64, actual: i64) -> Result<(), PayloadError> {
    if expected != actual {
        return Err(PayloadError::Consistency {
            field: field.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Add `amount` to a running sum, failing with
/// [`PayloadError::Consistency`] instead of wrapping.
pub(crate) fn accumulate(field: &str, sum: &mut i64, amount: i64) -> Result<(), PayloadError> {
    let current = *sum;
    *sum = current
        .checked_add(amount)
        .ok_or_else(|| PayloadError::Consistency {
            field: field.to_string(),
            expected: current,
            actual: amount,
        })?;
    Ok(())
}

/// Truncate to at most `max` characters (authority field limits).
pub(crate) fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_refuses_to_wrap() {
        let mut sum = i64::MAX - 1;
        accumulate("taxblAmtB", &mut sum, 1).unwrap();
        assert_eq!(sum, i64::MAX);
        let err = accumulate("taxblAmtB", &mut sum, 1).unwrap_err();
        assert!(matches!(
            err,
            PayloadError::Consistency { ref field, expected: i64::MAX, actual: 1 } if field == "taxblAmtB"
        ));
        assert_eq!(sum, i64::MAX);
    }
}
