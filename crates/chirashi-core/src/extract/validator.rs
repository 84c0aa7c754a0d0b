//! Sanity rules for paired records.

use crate::models::config::ExtractionConfig;
use crate::models::record::{ExtractionRecord, RecordViolation};

/// Checks paired records before they are accepted.
#[derive(Debug, Clone)]
pub struct RecordValidator {
    price_ceiling: i64,
}

impl RecordValidator {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            price_ceiling: config.price_ceiling,
        }
    }

    /// Every rule the record breaks; empty when it is valid.
    pub fn violations(&self, record: &ExtractionRecord) -> Vec<RecordViolation> {
        let mut violations = Vec::new();

        if record.prices().any(|p| p.amount <= 0) {
            violations.push(RecordViolation::NonPositiveAmount);
        }
        if record.prices().any(|p| p.amount > self.price_ceiling) {
            violations.push(RecordViolation::AmountAboveCeiling);
        }
        if record.product.text.trim().is_empty() {
            violations.push(RecordViolation::EmptyProduct);
        }
        if let (Some(incl), Some(excl)) = (record.price_incl_amount(), record.price_excl_amount()) {
            if incl < excl {
                violations.push(RecordViolation::TaxInversion);
            }
        }

        violations
    }
}
