//! End-to-end extraction for one flyer image.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::record::{
    ExtractionOutput, ExtractionRecord, PriceCandidate, RecordViolation, Rejection, RejectionReason,
};
use crate::ocr::{OcrPage, RawToken};

use super::normalizer::{NoCorrection, ReplacementCorrector, TextCorrector, TokenNormalizer};
use super::pairer::{Pairer, Pairing, PriceClaim};
use super::prices::PriceParser;
use super::rules::{extract_unit, format_yen, infer_tax_rate};
use super::scorer::ConfidenceScorer;
use super::spatial::SpatialIndex;
use super::validator::RecordValidator;
use super::{FlyerExtractor, Result};

/// Normalize, index, parse, pair, score and validate.
///
/// Synchronous and self-contained: every intermediate structure is built
/// per call, so one engine can serve many images from many threads.
pub struct PriceExtractionEngine {
    config: ExtractionConfig,
    corrector: Box<dyn TextCorrector>,
}

impl PriceExtractionEngine {
    /// Create an engine, rejecting out-of-range tunables.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        let corrector: Box<dyn TextCorrector> = if config.corrections.is_empty() {
            Box::new(NoCorrection)
        } else {
            Box::new(ReplacementCorrector::new(&config.corrections))
        };
        Ok(Self { config, corrector })
    }

    /// Replace the OCR misread correction hook.
    pub fn with_corrector(mut self, corrector: impl TextCorrector + 'static) -> Self {
        self.corrector = Box::new(corrector);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn run(&self, raw: &[RawToken]) -> Result<ExtractionOutput> {
        if raw.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        let start = Instant::now();

        let normalized = TokenNormalizer::new(&self.config, self.corrector.as_ref()).normalize(raw);
        let index = SpatialIndex::build(
            &normalized.tokens,
            self.config.band_overlap_fraction,
            self.config.distance_metric,
        );
        debug!(bands = index.band_count(), "built spatial index");

        let parsed = PriceParser::new(&index, &self.config).parse();
        let pairing = Pairer::new(&index, &self.config).pair(&parsed.candidates);

        let mut rejections = normalized.rejections;
        rejections.extend(parsed.rejections);
        let (records, invalid) = self.finalize(pairing, &parsed.candidates, &mut rejections);

        info!(
            tokens = normalized.tokens.len(),
            candidates = parsed.candidates.len(),
            records = records.len(),
            invalid,
            rejections = rejections.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "extraction complete"
        );

        Ok(ExtractionOutput {
            source: None,
            records,
            rejections,
        })
    }

    /// Score and validate paired records; settle every claimed candidate.
    fn finalize(
        &self,
        pairing: Pairing,
        candidates: &[PriceCandidate],
        rejections: &mut Vec<Rejection>,
    ) -> (Vec<ExtractionRecord>, usize) {
        let scorer = ConfidenceScorer::new(&self.config);
        let validator = RecordValidator::new(&self.config);
        let Pairing {
            spans,
            records: paired,
            mut ledger,
            rejections: orphans,
        } = pairing;
        rejections.extend(orphans);

        let claimed = |claim: &PriceClaim| {
            let mut price = candidates[claim.candidate.0].clone();
            price.tax_variant = claim.variant;
            price.variant_inferred = claim.inferred;
            price
        };

        let mut records = Vec::with_capacity(paired.len());
        let mut invalid = 0;
        for draft in paired {
            let product = spans[draft.span.0].clone();
            let price_incl = draft.incl.as_ref().map(claimed);
            let price_excl = draft.excl.as_ref().map(claimed);

            let unit = price_incl
                .iter()
                .chain(price_excl.iter())
                .find_map(|p| p.unit_basis.clone())
                .or_else(|| extract_unit(&product.text));
            let tax_rate = match (&price_incl, &price_excl) {
                (Some(incl), Some(excl)) => infer_tax_rate(incl.amount, excl.amount),
                _ => None,
            };

            let record = ExtractionRecord {
                confidence: scorer.score_record(draft.claims().map(|c| &c.evidence)),
                product,
                price_incl,
                price_excl,
                unit,
                tax_rate,
            };

            let violations = validator.violations(&record);
            if violations.is_empty() {
                for claim in draft.claims() {
                    ledger.validate(claim.candidate);
                }
                records.push(record);
            } else {
                for claim in draft.claims() {
                    ledger.discard(claim.candidate);
                }
                invalid += 1;
                rejections.extend(violations.into_iter().map(|v| self.reject(&record, v)));
            }
        }

        (records, invalid)
    }

    fn reject(&self, record: &ExtractionRecord, violation: RecordViolation) -> Rejection {
        let reason = RejectionReason::InvalidRecord(violation);
        let price_text = |pick: fn(&PriceCandidate, i64) -> bool| {
            record
                .prices()
                .find(|p| pick(p, self.config.price_ceiling))
                .map(|p| p.text.clone())
                .unwrap_or_default()
        };

        match violation {
            RecordViolation::NonPositiveAmount => {
                Rejection::new(reason, price_text(|p, _| p.amount <= 0)).with_detail(record.product.text.clone())
            }
            RecordViolation::AmountAboveCeiling => Rejection::new(reason, price_text(|p, ceiling| p.amount > ceiling))
                .with_detail(format!("ceiling {}", format_yen(self.config.price_ceiling))),
            RecordViolation::EmptyProduct => {
                let prices: Vec<&str> = record.prices().map(|p| p.text.as_str()).collect();
                Rejection::new(reason, prices.join(" "))
            }
            RecordViolation::TaxInversion => Rejection::new(reason, record.product.text.clone()).with_detail(format!(
                "税込 {} < 税抜 {}",
                format_yen(record.price_incl_amount().unwrap_or_default()),
                format_yen(record.price_excl_amount().unwrap_or_default())
            )),
        }
    }
}

impl FlyerExtractor for PriceExtractionEngine {
    fn extract(&self, page: &OcrPage) -> Result<ExtractionOutput> {
        let mut output = self.run(&page.tokens)?;
        output.source = page.source.clone();
        Ok(output)
    }

    fn extract_tokens(&self, tokens: &[RawToken]) -> Result<ExtractionOutput> {
        self.run(tokens)
    }
}
