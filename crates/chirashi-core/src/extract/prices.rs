//! Assembling price candidates from numeric and symbol tokens.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::models::config::ExtractionConfig;
use crate::models::record::{CandidateId, PriceCandidate, Rejection, RejectionReason, TaxVariant};
use crate::models::token::{Token, TokenId};
use crate::ocr::BBox;

use super::rules::amounts::whole_yen;
use super::rules::patterns::{PERCENT_MARKER, THOUSANDS_GROUP};
use super::rules::tax::is_currency_symbol;
use super::rules::{detect_tax_marker, parse_yen_amount, per_unit_basis, read_numeric, NonPrice, TaxMarker};
use super::spatial::SpatialIndex;

/// Candidates in reading order plus the numeric runs that were not prices.
#[derive(Debug, Clone, Default)]
pub struct ParsedPrices {
    pub candidates: Vec<PriceCandidate>,
    pub rejections: Vec<Rejection>,
}

/// Markers and signs found around a number.
#[derive(Debug, Default)]
struct MarkerContext {
    currency: Vec<TokenId>,
    marker: Option<(TokenId, TaxMarker)>,
    unit: Option<(TokenId, String)>,
}

impl MarkerContext {
    fn tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.currency
            .iter()
            .copied()
            .chain(self.marker.map(|(id, _)| id))
            .chain(self.unit.as_ref().map(|(id, _)| *id))
    }
}

#[derive(Debug, Default)]
struct ParseState {
    /// Symbol tokens already owned by a candidate.
    claimed: HashSet<TokenId>,
    /// Numeric tokens already read as part of a joined price.
    joined: HashSet<TokenId>,
    next_group: usize,
    parsed: ParsedPrices,
}

/// Reads price candidates off a spatial index.
pub struct PriceParser<'a> {
    index: &'a SpatialIndex<'a>,
    config: &'a ExtractionConfig,
}

impl<'a> PriceParser<'a> {
    pub fn new(index: &'a SpatialIndex<'a>, config: &'a ExtractionConfig) -> Self {
        Self { index, config }
    }

    /// Walk numeric tokens band by band, left to right.
    pub fn parse(&self) -> ParsedPrices {
        let mut state = ParseState::default();

        for band in 0..self.index.band_count() {
            for &id in self.index.band_members(band) {
                if self.index.token(id).is_numeric() && !state.joined.contains(&id) {
                    self.parse_number(id, &mut state);
                }
            }
        }

        debug!(
            candidates = state.parsed.candidates.len(),
            unparseable = state.parsed.rejections.len(),
            "parsed price candidates"
        );
        state.parsed
    }

    fn parse_number(&self, id: TokenId, state: &mut ParseState) {
        let token = self.index.token(id);

        let reading = match read_numeric(&token.text, self.config.max_price_digits) {
            Ok(reading) => reading,
            Err(NonPrice::DanglingGroup) => {
                match (parse_yen_amount(&token.text), self.join_partner(id, state)) {
                    (Some(head), Some((partner, tail, currency))) => {
                        self.push_joined(id, partner, head, tail, currency, None, state);
                    }
                    _ => reject(token, NonPrice::DanglingGroup, state),
                }
                return;
            }
            Err(reason) => {
                reject(token, reason, state);
                return;
            }
        };

        if let Some(reason) = self.adjacent_non_price(id) {
            reject(token, reason, state);
            return;
        }

        if reading.bare_group {
            let gap_limit = self.config.join_gap_factor * token.height();
            if let Some((partner, tail, currency)) = self
                .join_partner(id, state)
                .filter(|(partner, _, _)| token.bbox.horizontal_gap(&self.index.token(*partner).bbox) <= gap_limit)
            {
                let group = state.next_group;
                state.next_group += 1;
                self.push_joined(id, partner, reading.value, tail, currency, Some(group), state);
                self.push_single(id, reading.value, false, Some(group), false, state);
                self.push_single(partner, tail, currency, Some(group), false, state);
                return;
            }
        }

        self.push_single(id, reading.value, reading.has_currency, None, true, state);
    }

    /// A 3-digit group right after `id` that completes its thousands.
    fn join_partner(&self, id: TokenId, state: &ParseState) -> Option<(TokenId, Decimal, bool)> {
        let token = self.index.token(id);
        let partner = self.index.right_of(id)?;
        let next = self.index.token(partner);
        if !next.is_numeric() || state.joined.contains(&partner) || !THOUSANDS_GROUP.is_match(&next.text) {
            return None;
        }
        if token.bbox.horizontal_gap(&next.bbox) > self.marker_gap(token) {
            return None;
        }
        let value = parse_yen_amount(&next.text)?;
        Some((partner, value, next.text.ends_with('円')))
    }

    /// "%", "割", "/" or ":" right next to the number.
    fn adjacent_non_price(&self, id: TokenId) -> Option<NonPrice> {
        let token = self.index.token(id);
        [self.index.left_of(id), self.index.right_of(id)]
            .into_iter()
            .flatten()
            .map(|n| self.index.token(n))
            .filter(|other| other.is_symbol() && self.is_close(token, other))
            .find_map(|other| {
                if PERCENT_MARKER.is_match(&other.text) {
                    Some(NonPrice::Percentage)
                } else if matches!(other.text.as_str(), "/" | ":") {
                    Some(NonPrice::DateOrTime)
                } else {
                    None
                }
            })
    }

    #[allow(clippy::too_many_arguments)]
    fn push_joined(
        &self,
        head: TokenId,
        tail: TokenId,
        head_value: Decimal,
        tail_value: Decimal,
        currency: bool,
        group: Option<usize>,
        state: &mut ParseState,
    ) {
        state.joined.insert(tail);
        let value = head_value * Decimal::from(1000) + tail_value;
        let Some(amount) = whole_yen(value) else {
            reject(self.index.token(head), NonPrice::Unreadable, state);
            return;
        };
        let context = self.marker_context(head, tail, &state.claimed);
        state.claimed.extend(context.tokens());
        let candidate = self.build(&[head, tail], amount, currency, &context, group, state);
        state.parsed.candidates.push(candidate);
    }

    fn push_single(
        &self,
        id: TokenId,
        value: Decimal,
        currency: bool,
        group: Option<usize>,
        with_context: bool,
        state: &mut ParseState,
    ) {
        let Some(amount) = whole_yen(value) else {
            reject(self.index.token(id), NonPrice::Unreadable, state);
            return;
        };
        let context = if with_context {
            let context = self.marker_context(id, id, &state.claimed);
            state.claimed.extend(context.tokens());
            context
        } else {
            MarkerContext::default()
        };
        let candidate = self.build(&[id], amount, currency, &context, group, state);
        state.parsed.candidates.push(candidate);
    }

    fn build(
        &self,
        numbers: &[TokenId],
        amount: i64,
        own_currency: bool,
        context: &MarkerContext,
        group: Option<usize>,
        state: &ParseState,
    ) -> PriceCandidate {
        let tax_variant = match context.marker {
            Some((_, marker)) => marker.variant(),
            None if own_currency || !context.currency.is_empty() => TaxVariant::IncludedTax,
            None => TaxVariant::Unknown,
        };

        let mut source_tokens: Vec<TokenId> = numbers.iter().copied().chain(context.tokens()).collect();
        source_tokens.sort();
        source_tokens.dedup();

        let bbox = source_tokens
            .iter()
            .map(|&id| self.index.token(id).bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(self.index.token(numbers[0]).bbox);
        let text: String = source_tokens.iter().map(|&id| self.index.token(id).text.as_str()).collect();

        let candidate = PriceCandidate {
            id: CandidateId(state.parsed.candidates.len()),
            amount,
            tax_variant,
            variant_inferred: false,
            unit_basis: context.unit.as_ref().map(|(_, basis)| basis.clone()),
            source_tokens,
            bbox,
            text,
            alternative_group: group,
            band: self.index.band_of(numbers[0]),
        };
        trace!(
            amount = candidate.amount,
            variant = ?candidate.tax_variant,
            text = %candidate.text,
            "price candidate"
        );
        candidate
    }

    /// Currency signs, tax marker and per-unit basis around the number run
    /// `first..=last`.
    fn marker_context(&self, first: TokenId, last: TokenId, claimed: &HashSet<TokenId>) -> MarkerContext {
        let mut context = MarkerContext::default();
        let number = self.index.token(first).bbox.union(&self.index.token(last).bbox);
        let height = self.index.token(first).height().max(self.index.token(last).height());

        // Leftwards: "本体価格 ¥ 1,280", "100gあたり 198円"
        let mut current = first;
        while let Some(left) = self.index.left_of(current) {
            let token = self.index.token(left);
            if !self.is_free_symbol(token, claimed)
                || token.bbox.horizontal_gap(&self.index.token(current).bbox) > self.config.marker_gap_factor * height
            {
                break;
            }
            if is_currency_symbol(&token.text) && context.currency.is_empty() {
                context.currency.push(left);
            } else if let Some(marker) = detect_tax_marker(&token.text).filter(|_| context.marker.is_none()) {
                context.marker = Some((left, marker));
            } else if let Some(basis) = per_unit_basis(&token.text).filter(|_| context.unit.is_none()) {
                context.unit = Some((left, basis));
            } else {
                break;
            }
            current = left;
        }

        // Rightwards: "198 円", "298円 (税込)"
        let mut current = last;
        while let Some(right) = self.index.right_of(current) {
            let token = self.index.token(right);
            if !self.is_free_symbol(token, claimed)
                || token.bbox.horizontal_gap(&self.index.token(current).bbox) > self.config.marker_gap_factor * height
            {
                break;
            }
            if is_currency_symbol(&token.text) && context.currency.is_empty() {
                context.currency.push(right);
            } else if let Some(marker) = detect_tax_marker(&token.text).filter(|_| context.marker.is_none()) {
                if self.is_prefix_marker(right) {
                    break;
                }
                context.marker = Some((right, marker));
            } else {
                break;
            }
            current = right;
        }

        if context.marker.is_none() {
            context.marker = self.stacked_marker(first, &number, height, claimed);
        }
        context
    }

    /// A marker in the band directly below (or else above) the number,
    /// overlapping it horizontally.
    fn stacked_marker(
        &self,
        first: TokenId,
        number: &BBox,
        height: f32,
        claimed: &HashSet<TokenId>,
    ) -> Option<(TokenId, TaxMarker)> {
        let band = self.index.band_of(first);
        let bands = [Some(band + 1), band.checked_sub(1)];
        bands.into_iter().flatten().find_map(|b| {
            self.index.band_members(b).iter().find_map(|&id| {
                let token = self.index.token(id);
                let stacked = token.bbox.horizontal_overlap(number) > 0.0
                    && token.bbox.vertical_gap(number) <= self.config.marker_gap_factor * height;
                if !stacked || !self.is_free_symbol(token, claimed) || self.is_prefix_marker(id) {
                    return None;
                }
                detect_tax_marker(&token.text).map(|marker| (id, marker))
            })
        })
    }

    /// A marker immediately followed by a number labels that number.
    fn is_prefix_marker(&self, id: TokenId) -> bool {
        let mut current = id;
        while let Some(next) = self.index.right_of(current) {
            let token = self.index.token(next);
            if !self.is_close(self.index.token(current), token) {
                return false;
            }
            if token.is_numeric() {
                return true;
            }
            if token.text != "¥" {
                return false;
            }
            current = next;
        }
        false
    }

    fn is_free_symbol(&self, token: &Token, claimed: &HashSet<TokenId>) -> bool {
        token.is_symbol() && !claimed.contains(&token.id)
    }

    fn is_close(&self, a: &Token, b: &Token) -> bool {
        a.bbox.horizontal_gap(&b.bbox) <= self.marker_gap(a)
    }

    fn marker_gap(&self, token: &Token) -> f32 {
        self.config.marker_gap_factor * token.height()
    }
}

fn reject(token: &Token, reason: NonPrice, state: &mut ParseState) {
    trace!(text = %token.text, %reason, "not a price");
    state.parsed.rejections.push(
        Rejection::new(RejectionReason::UnparseablePrice, token.text.clone()).with_detail(reason.to_string()),
    );
}
