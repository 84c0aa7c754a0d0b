//! Linking price candidates to product name spans.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use crate::models::config::ExtractionConfig;
use crate::models::record::{
    CandidateId, PriceCandidate, ProductSpan, Rejection, RejectionReason, SpanId, TaxVariant,
};
use crate::models::token::TokenId;

use super::rules::is_plausible_pair;
use super::scorer::{BandRelation, PairEvidence};
use super::spatial::{Direction, SpatialIndex};

/// Life cycle of a price candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateState {
    Unpaired,
    Paired,
    Validated,
    Discarded,
}

impl CandidateState {
    fn can_become(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Unpaired, Paired) | (Unpaired, Discarded) | (Paired, Validated) | (Paired, Discarded)
        )
    }
}

/// Per-candidate states, indexed by [`CandidateId`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLedger {
    states: Vec<CandidateState>,
}

impl CandidateLedger {
    pub fn new(candidates: usize) -> Self {
        Self {
            states: vec![CandidateState::Unpaired; candidates],
        }
    }

    pub fn state(&self, id: CandidateId) -> CandidateState {
        self.states[id.0]
    }

    pub fn pair(&mut self, id: CandidateId) -> bool {
        self.advance(id, CandidateState::Paired)
    }

    pub fn validate(&mut self, id: CandidateId) -> bool {
        self.advance(id, CandidateState::Validated)
    }

    pub fn discard(&mut self, id: CandidateId) -> bool {
        self.advance(id, CandidateState::Discarded)
    }

    /// Number of candidates in `state`.
    pub fn count(&self, state: CandidateState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }

    /// Move to `next` if the transition is allowed; never goes back.
    fn advance(&mut self, id: CandidateId, next: CandidateState) -> bool {
        let current = self.states[id.0];
        if current.can_become(next) {
            self.states[id.0] = next;
            true
        } else {
            debug_assert!(false, "illegal transition {:?} -> {:?} for {:?}", current, next, id);
            false
        }
    }
}

/// One price linked into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceClaim {
    pub candidate: CandidateId,
    /// Variant the price holds in the record; differs from the candidate's
    /// own when `inferred`.
    pub variant: TaxVariant,
    pub inferred: bool,
    pub evidence: PairEvidence,
}

impl PriceClaim {
    /// Held as `variant` on the strength of its own markers.
    fn is_confirmed(&self, variant: TaxVariant) -> bool {
        self.variant == variant && !self.inferred
    }
}

/// A product span with the prices claimed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedRecord {
    pub span: SpanId,
    pub incl: Option<PriceClaim>,
    pub excl: Option<PriceClaim>,
}

impl PairedRecord {
    pub fn claims(&self) -> impl Iterator<Item = &PriceClaim> {
        self.incl.iter().chain(self.excl.iter())
    }
}

/// Everything the pairing step produced for one image.
#[derive(Debug, Clone)]
pub struct Pairing {
    pub spans: Vec<ProductSpan>,
    pub records: Vec<PairedRecord>,
    pub ledger: CandidateLedger,
    pub rejections: Vec<Rejection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Incl,
    Excl,
}

/// Where a candidate fits in a record, and as which variant.
#[derive(Debug, Clone, Copy)]
struct Fit {
    slot: Slot,
    variant: TaxVariant,
    inferred: bool,
}

/// Tie-break chain among product spans competing for one price: same band,
/// then distance, then longer text, then direction, then arena order.
#[derive(Debug, Clone, Copy)]
pub struct PairingKey {
    pub same_band: bool,
    pub distance: f32,
    pub text_len: usize,
    pub direction: Direction,
    pub span: SpanId,
}

impl Ord for PairingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .same_band
            .cmp(&self.same_band)
            .then_with(|| self.distance.total_cmp(&other.distance))
            .then_with(|| other.text_len.cmp(&self.text_len))
            .then_with(|| self.direction.rank().cmp(&other.direction.rank()))
            .then_with(|| self.span.cmp(&other.span))
    }
}

impl PartialOrd for PairingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PairingKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PairingKey {}

struct Placement {
    record: Option<usize>,
    span: SpanId,
    fit: Fit,
    evidence: PairEvidence,
}

/// Working state of one pairing run.
struct Arena<'c> {
    candidates: &'c [PriceCandidate],
    spans: Vec<ProductSpan>,
    span_of: Vec<Option<SpanId>>,
    owner: Vec<Option<usize>>,
    records: Vec<PairedRecord>,
}

impl Arena<'_> {
    fn amount(&self, claim: &PriceClaim) -> i64 {
        self.candidates[claim.candidate.0].amount
    }

    /// Slot `candidate` can take in `record` (a fresh record when `None`).
    fn fit(&self, candidate: &PriceCandidate, record: Option<&PairedRecord>) -> Option<Fit> {
        let explicit = |slot, variant| Fit { slot, variant, inferred: false };
        let Some(record) = record else {
            return Some(match candidate.tax_variant {
                TaxVariant::ExcludedTax => explicit(Slot::Excl, TaxVariant::ExcludedTax),
                variant => explicit(Slot::Incl, variant),
            });
        };

        match candidate.tax_variant {
            TaxVariant::IncludedTax => record
                .incl
                .is_none()
                .then(|| explicit(Slot::Incl, TaxVariant::IncludedTax)),
            TaxVariant::ExcludedTax => record
                .excl
                .is_none()
                .then(|| explicit(Slot::Excl, TaxVariant::ExcludedTax)),
            TaxVariant::Unknown => match (&record.incl, &record.excl) {
                (Some(incl), None)
                    if incl.is_confirmed(TaxVariant::IncludedTax)
                        && is_plausible_pair(self.amount(incl), candidate.amount) =>
                {
                    Some(Fit {
                        slot: Slot::Excl,
                        variant: TaxVariant::ExcludedTax,
                        inferred: true,
                    })
                }
                (None, Some(excl))
                    if excl.is_confirmed(TaxVariant::ExcludedTax)
                        && is_plausible_pair(candidate.amount, self.amount(excl)) =>
                {
                    Some(Fit {
                        slot: Slot::Incl,
                        variant: TaxVariant::IncludedTax,
                        inferred: true,
                    })
                }
                _ => None,
            },
        }
    }
}

/// Pairs price candidates with product spans.
pub struct Pairer<'a> {
    index: &'a SpatialIndex<'a>,
    config: &'a ExtractionConfig,
}

impl<'a> Pairer<'a> {
    pub fn new(index: &'a SpatialIndex<'a>, config: &'a ExtractionConfig) -> Self {
        Self { index, config }
    }

    /// Group text tokens into product spans: runs of text tokens that sit
    /// close together, walking each band left to right.
    pub fn build_spans(&self) -> (Vec<ProductSpan>, Vec<Option<SpanId>>) {
        let mut spans = Vec::new();
        let mut span_of = vec![None; self.index.tokens().len()];

        for band in 0..self.index.band_count() {
            let mut run: Vec<TokenId> = Vec::new();
            for &id in self.index.band_members(band) {
                let is_text = self.index.token(id).is_text();
                let continues = is_text && run.last().is_some_and(|&prev| self.continues_run(prev, id));
                if !continues && !run.is_empty() {
                    self.push_span(&mut spans, &mut span_of, std::mem::take(&mut run));
                }
                if is_text {
                    run.push(id);
                }
            }
            if !run.is_empty() {
                self.push_span(&mut spans, &mut span_of, run);
            }
        }

        debug!(spans = spans.len(), "built product spans");
        (spans, span_of)
    }

    fn continues_run(&self, prev: TokenId, next: TokenId) -> bool {
        let band = self.index.band_of(prev);
        if band != self.index.band_of(next) {
            return false;
        }
        let (a, b) = (self.index.token(prev), self.index.token(next));
        if a.bbox.center().0 >= b.bbox.center().0 {
            return false;
        }
        let height = self.index.band_height(band);
        let gap = a.bbox.horizontal_gap(&b.bbox);
        gap <= self.config.run_gap_factor * height && gap >= -0.5 * height
    }

    fn push_span(&self, spans: &mut Vec<ProductSpan>, span_of: &mut [Option<SpanId>], run: Vec<TokenId>) {
        let id = SpanId(spans.len());
        let mut text = String::new();
        let mut bbox = self.index.token(run[0]).bbox;

        for (i, &token_id) in run.iter().enumerate() {
            let token = self.index.token(token_id);
            if i > 0 {
                let prev = self.index.token(run[i - 1]);
                let wide_gap = prev.bbox.horizontal_gap(&token.bbox) > 0.25 * prev.height().min(token.height());
                let ascii_boundary = prev.text.chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
                    && token.text.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
                if wide_gap || ascii_boundary {
                    text.push(' ');
                }
            }
            text.push_str(&token.text);
            bbox = bbox.union(&token.bbox);
            span_of[token_id.0] = Some(id);
        }

        spans.push(ProductSpan {
            id,
            text,
            bbox,
            source_tokens: run,
        });
    }

    /// Pair every candidate, in reading order.
    pub fn pair(&self, candidates: &[PriceCandidate]) -> Pairing {
        let (spans, span_of) = self.build_spans();
        let mut arena = Arena {
            candidates,
            owner: vec![None; spans.len()],
            spans,
            span_of,
            records: Vec::new(),
        };
        let mut ledger = CandidateLedger::new(candidates.len());
        let mut rejections = Vec::new();
        let mut claimed_groups = HashSet::new();
        let mut group_orphans = BTreeMap::new();

        for candidate in candidates {
            if candidate
                .alternative_group
                .is_some_and(|g| claimed_groups.contains(&g))
            {
                trace!(amount = candidate.amount, "alternative reading dropped");
                ledger.discard(candidate.id);
                continue;
            }

            let max_distance = self.config.max_distance_multiplier * candidate.bbox.height();
            let placement = self.place(&arena, candidate, max_distance);

            let Some(placement) = placement else {
                trace!(amount = candidate.amount, max_distance, "orphan price");
                ledger.discard(candidate.id);
                let rejection = Rejection::new(RejectionReason::OrphanPrice, candidate.text.clone())
                    .with_detail(format!("no product text within {:.0}px", max_distance));
                match candidate.alternative_group {
                    Some(group) => {
                        group_orphans.entry(group).or_insert(rejection);
                    }
                    None => rejections.push(rejection),
                }
                continue;
            };

            trace!(
                amount = candidate.amount,
                product = %arena.spans[placement.span.0].text,
                distance = placement.evidence.distance,
                "price paired"
            );
            self.apply(&mut arena, candidate, placement);
            ledger.pair(candidate.id);
            if let Some(group) = candidate.alternative_group {
                claimed_groups.insert(group);
            }
        }

        rejections.extend(
            group_orphans
                .into_iter()
                .filter(|(group, _)| !claimed_groups.contains(group))
                .map(|(_, rejection)| rejection),
        );

        debug!(
            records = arena.records.len(),
            orphans = rejections.len(),
            "paired prices"
        );
        Pairing {
            spans: arena.spans,
            records: arena.records,
            ledger,
            rejections,
        }
    }

    fn apply(&self, arena: &mut Arena<'_>, candidate: &PriceCandidate, placement: Placement) {
        let claim = PriceClaim {
            candidate: candidate.id,
            variant: placement.fit.variant,
            inferred: placement.fit.inferred,
            evidence: placement.evidence,
        };
        let record = match placement.record {
            Some(index) => &mut arena.records[index],
            None => {
                arena.owner[placement.span.0] = Some(arena.records.len());
                arena.records.push(PairedRecord {
                    span: placement.span,
                    incl: None,
                    excl: None,
                });
                let last = arena.records.len() - 1;
                &mut arena.records[last]
            }
        };
        match placement.fit.slot {
            Slot::Incl => record.incl = Some(claim),
            Slot::Excl => record.excl = Some(claim),
        }
    }

    /// The best span in range decides. A dual-display partner only settles
    /// prices that no span in range can take, or that land on its record
    /// anyway.
    fn place(&self, arena: &Arena<'_>, candidate: &PriceCandidate, max_distance: f32) -> Option<Placement> {
        let companion = self.companion(arena, candidate, max_distance);
        match self.nearest_span(arena, candidate, max_distance) {
            Some(best) => Some(match companion {
                Some(companion) if companion.record == best.record => companion,
                _ => best,
            }),
            None => companion,
        }
    }

    /// Dual display: join a record whose other price is stacked right above
    /// or below this one, or beside it in the same band.
    fn companion(&self, arena: &Arena<'_>, candidate: &PriceCandidate, max_distance: f32) -> Option<Placement> {
        arena
            .records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let fit = arena.fit(candidate, Some(record))?;
                let partner = match fit.slot {
                    Slot::Incl => record.excl.as_ref(),
                    Slot::Excl => record.incl.as_ref(),
                }?;
                let partner = &arena.candidates[partner.candidate.0];

                let beside = partner.band == candidate.band;
                let stacked = partner.band.abs_diff(candidate.band) == 1
                    && partner.bbox.horizontal_overlap(&candidate.bbox) > 0.0;
                if !(beside || stacked) {
                    return None;
                }
                let distance = self.index.distance(&candidate.bbox, &partner.bbox);
                if distance > max_distance {
                    return None;
                }

                Some(Placement {
                    record: Some(index),
                    span: record.span,
                    fit,
                    evidence: PairEvidence {
                        distance,
                        max_distance,
                        band: BandRelation::between(candidate.band, partner.band),
                        explicit_marker: candidate.has_explicit_marker(),
                        text_len: arena.spans[record.span.0].text_len(),
                    },
                })
            })
            .min_by(|a, b| {
                a.evidence
                    .distance
                    .total_cmp(&b.evidence.distance)
                    .then_with(|| a.record.cmp(&b.record))
            })
    }

    /// Best product span in range that may still take this price.
    fn nearest_span(&self, arena: &Arena<'_>, candidate: &PriceCandidate, max_distance: f32) -> Option<Placement> {
        let hits = self
            .index
            .nearest_text_tokens(&candidate.bbox, max_distance, Direction::Any);
        let mut seen = HashSet::new();
        let mut best: Option<(PairingKey, Placement)> = None;

        for hit in hits {
            let Some(span_id) = arena.span_of[hit.token.0] else {
                continue;
            };
            // Hits are nearest first, so the first hit is the span's distance
            if !seen.insert(span_id) {
                continue;
            }
            let record = arena.owner[span_id.0].map(|index| &arena.records[index]);
            let Some(fit) = arena.fit(candidate, record) else {
                continue;
            };

            let span = &arena.spans[span_id.0];
            let band_gap = span
                .source_tokens
                .iter()
                .map(|&t| self.index.band_of(t).abs_diff(candidate.band))
                .min()
                .unwrap_or(usize::MAX);
            let key = PairingKey {
                same_band: band_gap == 0,
                distance: hit.distance,
                text_len: span.text_len(),
                direction: hit.direction,
                span: span_id,
            };
            let placement = Placement {
                record: arena.owner[span_id.0],
                span: span_id,
                fit,
                evidence: PairEvidence {
                    distance: hit.distance,
                    max_distance,
                    band: BandRelation::between(0, band_gap),
                    explicit_marker: candidate.has_explicit_marker(),
                    text_len: span.text_len(),
                },
            };

            if best.as_ref().is_none_or(|(current, _)| key < *current) {
                best = Some((key, placement));
            }
        }

        best.map(|(_, placement)| placement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::normalizer::{NoCorrection, TokenNormalizer};
    use crate::extract::prices::PriceParser;
    use crate::ocr::RawToken;
    use pretty_assertions::assert_eq;

    fn run(raw: Vec<RawToken>) -> (Vec<PriceCandidate>, Pairing) {
        let config = ExtractionConfig::default();
        let tokens = TokenNormalizer::new(&config, &NoCorrection).normalize(&raw).tokens;
        let index = SpatialIndex::build(&tokens, config.band_overlap_fraction, config.distance_metric);
        let candidates = PriceParser::new(&index, &config).parse().candidates;
        let pairing = Pairer::new(&index, &config).pair(&candidates);
        (candidates, pairing)
    }

    fn spans(raw: Vec<RawToken>) -> Vec<String> {
        let config = ExtractionConfig::default();
        let tokens = TokenNormalizer::new(&config, &NoCorrection).normalize(&raw).tokens;
        let index = SpatialIndex::build(&tokens, config.band_overlap_fraction, config.distance_metric);
        let (spans, _) = Pairer::new(&index, &config).build_spans();
        spans.into_iter().map(|s| s.text).collect()
    }

    #[test]
    fn test_spans_join_close_tokens_on_one_band() {
        let texts = spans(vec![
            RawToken::rect("国産", 0.0, 0.0, 60.0, 30.0),
            RawToken::rect("豚バラ", 65.0, 0.0, 150.0, 30.0),
            RawToken::rect("遠く", 400.0, 0.0, 460.0, 30.0),
            RawToken::rect("BOX", 0.0, 100.0, 60.0, 130.0),
            RawToken::rect("TISSUE", 62.0, 100.0, 160.0, 130.0),
            RawToken::rect("下の行", 0.0, 200.0, 90.0, 230.0),
        ]);
        assert_eq!(texts, vec!["国産豚バラ", "遠く", "BOX TISSUE", "下の行"]);
    }

    #[test]
    fn test_spans_ignore_input_reading_order() {
        let texts = spans(vec![
            RawToken::rect("国産", 0.0, 0.0, 60.0, 30.0).with_reading_order(1),
            RawToken::rect("豚バラ", 65.0, 0.0, 150.0, 30.0).with_reading_order(0),
            RawToken::rect("298円", 155.0, 0.0, 215.0, 30.0).with_reading_order(2),
        ]);
        assert_eq!(texts, vec!["国産豚バラ"]);
    }

    #[test]
    fn test_spans_break_at_prices() {
        let texts = spans(vec![
            RawToken::rect("みかん", 0.0, 0.0, 80.0, 30.0),
            RawToken::rect("298円", 85.0, 0.0, 140.0, 30.0),
            RawToken::rect("りんご", 145.0, 0.0, 220.0, 30.0),
        ]);
        assert_eq!(texts, vec!["みかん", "りんご"]);
    }

    #[test]
    fn test_pairing_key_chain() {
        let key = |same_band, distance, text_len, direction, span| PairingKey {
            same_band,
            distance,
            text_len,
            direction,
            span: SpanId(span),
        };

        assert!(key(true, 90.0, 2, Direction::Right, 1) < key(false, 10.0, 9, Direction::Left, 0));
        assert!(key(true, 10.0, 2, Direction::Right, 1) < key(true, 20.0, 9, Direction::Left, 0));
        assert!(key(true, 10.0, 9, Direction::Right, 1) < key(true, 10.0, 2, Direction::Left, 0));
        assert!(key(true, 10.0, 4, Direction::Left, 1) < key(true, 10.0, 4, Direction::Above, 0));
        assert!(key(false, 10.0, 4, Direction::Above, 1) < key(false, 10.0, 4, Direction::Below, 0));
        assert!(key(true, 10.0, 4, Direction::Left, 0) < key(true, 10.0, 4, Direction::Left, 1));
    }

    #[test]
    fn test_same_band_span_wins_over_closer_one() {
        let (_, pairing) = run(vec![
            RawToken::rect("キャベツ", 40.0, 100.0, 130.0, 140.0),
            RawToken::rect("158円", 150.0, 100.0, 210.0, 140.0),
            RawToken::rect("特売", 150.0, 55.0, 210.0, 85.0),
        ]);

        assert_eq!(pairing.records.len(), 1);
        let span = &pairing.spans[pairing.records[0].span.0];
        assert_eq!(span.text, "キャベツ");
    }

    #[test]
    fn test_span_claimed_once_per_variant() {
        let (_, pairing) = run(vec![
            RawToken::rect("398円", 30.0, 0.0, 90.0, 40.0),
            RawToken::rect("みかん", 100.0, 0.0, 180.0, 40.0),
            RawToken::rect("298円", 190.0, 0.0, 250.0, 40.0),
        ]);

        assert_eq!(pairing.records.len(), 1);
        assert_eq!(pairing.ledger.count(CandidateState::Paired), 1);
        assert_eq!(pairing.ledger.count(CandidateState::Discarded), 1);
        assert_eq!(pairing.rejections.len(), 1);
        assert_eq!(pairing.rejections[0].reason, RejectionReason::OrphanPrice);
        assert_eq!(pairing.rejections[0].text, "298円");
    }

    #[test]
    fn test_unknown_companion_inferred_as_excluded() {
        let (candidates, pairing) = run(vec![
            RawToken::rect("牛乳", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("198円", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("183", 90.0, 45.0, 150.0, 85.0),
        ]);

        assert_eq!(candidates.len(), 2);
        assert_eq!(pairing.records.len(), 1);
        let record = &pairing.records[0];
        let incl = record.incl.as_ref().unwrap();
        let excl = record.excl.as_ref().unwrap();
        assert_eq!(candidates[incl.candidate.0].amount, 198);
        assert_eq!(incl.variant, TaxVariant::IncludedTax);
        assert!(!incl.inferred);
        assert_eq!(candidates[excl.candidate.0].amount, 183);
        assert_eq!(excl.variant, TaxVariant::ExcludedTax);
        assert!(excl.inferred);
    }

    #[test]
    fn test_unknown_next_to_unknown_is_not_inferred() {
        let (candidates, pairing) = run(vec![
            RawToken::rect("牛乳", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("198", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("183", 90.0, 45.0, 150.0, 85.0),
        ]);

        assert_eq!(pairing.records.len(), 1);
        let record = &pairing.records[0];
        assert_eq!(candidates[record.incl.as_ref().unwrap().candidate.0].amount, 198);
        assert!(record.excl.is_none());
        assert_eq!(pairing.rejections.len(), 1);
        assert_eq!(pairing.rejections[0].text, "183");
    }

    #[test]
    fn test_implausible_unknown_pair_stays_apart() {
        let (_, pairing) = run(vec![
            RawToken::rect("牛乳", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("198円", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("98", 90.0, 45.0, 150.0, 85.0),
        ]);

        assert_eq!(pairing.records.len(), 1);
        assert!(pairing.records[0].excl.is_none());
        assert_eq!(pairing.rejections.len(), 1);
    }

    fn products_and_prices(candidates: &[PriceCandidate], pairing: &Pairing) -> Vec<(String, Option<i64>, Option<i64>)> {
        pairing
            .records
            .iter()
            .map(|r| {
                (
                    pairing.spans[r.span.0].text.clone(),
                    r.incl.as_ref().map(|c| candidates[c.candidate.0].amount),
                    r.excl.as_ref().map(|c| candidates[c.candidate.0].amount),
                )
            })
            .collect()
    }

    #[test]
    fn test_stacked_rows_keep_their_own_products() {
        let (candidates, pairing) = run(vec![
            RawToken::rect("みかん", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("298", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("りんご", 0.0, 50.0, 80.0, 90.0),
            RawToken::rect("280", 90.0, 50.0, 150.0, 90.0),
        ]);
        assert_eq!(
            products_and_prices(&candidates, &pairing),
            vec![
                ("みかん".to_string(), Some(298), None),
                ("りんご".to_string(), Some(280), None),
            ]
        );
        assert!(pairing.rejections.is_empty());

        let (candidates, pairing) = run(vec![
            RawToken::rect("みかん", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("298円", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("りんご", 0.0, 50.0, 80.0, 90.0),
            RawToken::rect("本体280円", 90.0, 50.0, 150.0, 90.0),
        ]);
        assert_eq!(
            products_and_prices(&candidates, &pairing),
            vec![
                ("みかん".to_string(), Some(298), None),
                ("りんご".to_string(), None, Some(280)),
            ]
        );
    }

    #[test]
    fn test_owned_span_refuses_second_price_of_same_variant() {
        let (candidates, pairing) = run(vec![
            RawToken::rect("みかん", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("298円", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("198円", 0.0, 45.0, 60.0, 85.0),
            RawToken::rect("りんご", 0.0, 100.0, 80.0, 140.0),
        ]);

        assert_eq!(
            products_and_prices(&candidates, &pairing),
            vec![
                ("みかん".to_string(), Some(298), None),
                ("りんご".to_string(), Some(198), None),
            ]
        );
    }

    #[test]
    fn test_owned_span_takes_complementary_price() {
        let (candidates, pairing) = run(vec![
            RawToken::rect("みかん", 0.0, 0.0, 80.0, 40.0),
            RawToken::rect("298円", 90.0, 0.0, 150.0, 40.0),
            RawToken::rect("本体275円", 0.0, 45.0, 80.0, 85.0),
            RawToken::rect("りんご", 0.0, 100.0, 80.0, 140.0),
        ]);

        assert_eq!(
            products_and_prices(&candidates, &pairing),
            vec![("みかん".to_string(), Some(298), Some(275))]
        );
        let excl = pairing.records[0].excl.as_ref().unwrap();
        assert_eq!(excl.variant, TaxVariant::ExcludedTax);
        assert!(!excl.inferred);
    }

    #[test]
    fn test_claimed_alternative_discards_the_rest() {
        let (candidates, pairing) = run(vec![
            RawToken::rect("セール品", 20.0, 0.0, 100.0, 40.0),
            RawToken::rect("1", 110.0, 0.0, 125.0, 40.0),
            RawToken::rect("980円", 128.0, 0.0, 200.0, 40.0),
        ]);

        assert_eq!(candidates.len(), 3);
        assert_eq!(pairing.records.len(), 1);
        let claim = pairing.records[0].incl.as_ref().unwrap();
        assert_eq!(candidates[claim.candidate.0].amount, 1980);
        assert_eq!(pairing.ledger.count(CandidateState::Paired), 1);
        assert_eq!(pairing.ledger.count(CandidateState::Discarded), 2);
        assert!(pairing.rejections.is_empty());
    }

    #[test]
    fn test_orphan_price() {
        let (candidates, pairing) = run(vec![RawToken::rect("198円", 0.0, 0.0, 60.0, 30.0)]);

        assert!(pairing.records.is_empty());
        assert_eq!(pairing.ledger.state(candidates[0].id), CandidateState::Discarded);
        assert_eq!(pairing.rejections[0].reason, RejectionReason::OrphanPrice);
    }

    #[test]
    fn test_ledger_transitions() {
        let mut ledger = CandidateLedger::new(2);
        assert!(ledger.pair(CandidateId(0)));
        assert!(ledger.validate(CandidateId(0)));
        assert!(ledger.discard(CandidateId(1)));
        assert_eq!(ledger.state(CandidateId(0)), CandidateState::Validated);
        assert_eq!(ledger.count(CandidateState::Discarded), 1);
        assert!(!CandidateState::Validated.can_become(CandidateState::Discarded));
        assert!(!CandidateState::Discarded.can_become(CandidateState::Paired));
        assert!(!CandidateState::Paired.can_become(CandidateState::Unpaired));
    }
}
