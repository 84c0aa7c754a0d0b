//! Turning raw OCR fragments into classified tokens.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::models::config::ExtractionConfig;
use crate::models::record::{Rejection, RejectionReason};
use crate::models::token::{Token, TokenId, TokenKind};
use crate::ocr::{BBox, RawToken};

use super::rules::patterns::{
    CURRENCY_SYMBOL, DANGLING_GROUP, MARKER_THEN_PRICE, MARKER_TOKEN, NUMERIC_TOKEN,
    PERCENT_MARKER, PER_UNIT_MARKER, PRICE_THEN_MARKER, PUNCTUATION_ONLY, SEPARATED_DIGITS,
    TEXT_THEN_PRICE,
};
use super::spatial::row_bands;

/// Hook for fixing character-level OCR misreads before classification.
pub trait TextCorrector: Send + Sync {
    fn correct<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl TextCorrector for NoCorrection {
    fn correct<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

/// Literal string replacements, longest pattern first.
#[derive(Debug, Clone, Default)]
pub struct ReplacementCorrector {
    replacements: Vec<(String, String)>,
}

impl ReplacementCorrector {
    pub fn new(table: &BTreeMap<String, String>) -> Self {
        let mut replacements: Vec<(String, String)> = table
            .iter()
            .filter(|(from, _)| !from.is_empty())
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect();
        replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { replacements }
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

impl TextCorrector for ReplacementCorrector {
    fn correct<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut result = Cow::Borrowed(text);
        for (from, to) in &self.replacements {
            if result.contains(from.as_str()) {
                result = Cow::Owned(result.replace(from.as_str(), to));
            }
        }
        result
    }
}

/// Fold full-width ASCII variants and the ideographic space to half-width.
pub fn fold_width(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let mapped = match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            '\u{FFE5}' => '¥',
            '\u{2212}' => '-',
            _ => c,
        };
        // Backslash is how yen renders in many Japanese fonts
        let next_is_digit = chars
            .peek()
            .map(|n| n.is_ascii_digit() || ('\u{FF10}'..='\u{FF19}').contains(n))
            .unwrap_or(false);
        if mapped == '\\' && next_is_digit {
            folded.push('¥');
        } else {
            folded.push(mapped);
        }
    }
    folded
}

/// Collapse whitespace runs to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Class of a single (already split) token text.
pub fn classify(text: &str) -> TokenKind {
    if NUMERIC_TOKEN.is_match(text) || SEPARATED_DIGITS.is_match(text) || DANGLING_GROUP.is_match(text) {
        TokenKind::Numeric
    } else if is_symbol_text(text) {
        TokenKind::Symbol
    } else {
        TokenKind::Text
    }
}

fn is_symbol_text(text: &str) -> bool {
    CURRENCY_SYMBOL.is_match(text)
        || MARKER_TOKEN.is_match(text)
        || PER_UNIT_MARKER.is_match(text)
        || PERCENT_MARKER.is_match(text)
        || PUNCTUATION_ONLY.is_match(text)
}

/// Byte range of one sub-token inside a normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Piece {
    start: usize,
    end: usize,
    kind: TokenKind,
}

fn trim_range(full: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &full[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    (start + lead, (end - trail).max(start + lead))
}

fn push_piece(full: &str, start: usize, end: usize, kind: TokenKind, out: &mut Vec<Piece>) {
    let (start, end) = trim_range(full, start, end);
    if start < end {
        out.push(Piece { start, end, kind });
    }
}

fn split_range(full: &str, start: usize, end: usize, out: &mut Vec<Piece>) {
    let (start, end) = trim_range(full, start, end);
    if start >= end {
        return;
    }
    let text = &full[start..end];

    if NUMERIC_TOKEN.is_match(text) {
        if text.starts_with('¥') {
            let sign = '¥'.len_utf8();
            push_piece(full, start, start + sign, TokenKind::Symbol, out);
            push_piece(full, start + sign, end, TokenKind::Numeric, out);
        } else {
            out.push(Piece { start, end, kind: TokenKind::Numeric });
        }
        return;
    }

    let kind = classify(text);
    if kind != TokenKind::Text {
        out.push(Piece { start, end, kind });
        return;
    }

    if let Some(price) = MARKER_THEN_PRICE.captures(text).and_then(|c| c.name("price")) {
        push_piece(full, start, start + price.start(), TokenKind::Symbol, out);
        split_range(full, start + price.start(), start + price.end(), out);
        return;
    }

    if let Some(price) = PRICE_THEN_MARKER.captures(text).and_then(|c| c.name("price")) {
        split_range(full, start, start + price.end(), out);
        push_piece(full, start + price.end(), end, TokenKind::Symbol, out);
        return;
    }

    if let Some(caps) = TEXT_THEN_PRICE.captures(text) {
        if let (Some(head), Some(price)) = (caps.name("text"), caps.name("price")) {
            split_range(full, start, start + head.end(), out);
            split_range(full, start + price.start(), start + price.end(), out);
            return;
        }
    }

    out.push(Piece { start, end, kind: TokenKind::Text });
}

fn split_pieces(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    split_range(text, 0, text.len(), &mut pieces);
    pieces
}

/// Output of [`TokenNormalizer::normalize`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedTokens {
    /// Tokens in reading order; `tokens[i].id == TokenId(i)`.
    pub tokens: Vec<Token>,
    /// One `MalformedToken` rejection per dropped polygon.
    pub rejections: Vec<Rejection>,
}

/// A raw fragment that survived cleaning, before it is split.
struct Fragment {
    raw_order: Option<u32>,
    position: usize,
    text: String,
    bbox: BBox,
    confidence: f32,
}

/// Cleans, splits and classifies raw OCR fragments.
pub struct TokenNormalizer<'a> {
    config: &'a ExtractionConfig,
    corrector: &'a dyn TextCorrector,
}

impl<'a> TokenNormalizer<'a> {
    pub fn new(config: &'a ExtractionConfig, corrector: &'a dyn TextCorrector) -> Self {
        Self { config, corrector }
    }

    pub fn normalize(&self, raw: &[RawToken]) -> NormalizedTokens {
        let mut rejections = Vec::new();
        let mut fragments = Vec::with_capacity(raw.len());

        for (position, token) in raw.iter().enumerate() {
            let folded = fold_width(&token.text);
            let text = collapse_whitespace(&self.corrector.correct(&folded));
            if text.is_empty() {
                trace!(position, "dropping whitespace-only token");
                continue;
            }

            let polygon = token.polygon();
            let Some(bbox) = BBox::from_vertices(&polygon, self.config.min_polygon_area) else {
                warn!(text = %text, vertices = polygon.len(), "dropping token with malformed polygon");
                rejections.push(
                    Rejection::new(RejectionReason::MalformedToken, text)
                        .with_detail(format!("{} vertices or degenerate area", polygon.len())),
                );
                continue;
            };

            fragments.push(Fragment {
                raw_order: token.reading_order_index,
                position,
                text,
                bbox,
                confidence: token.confidence,
            });
        }

        let order = self.reading_order(&fragments);
        let mut tokens = Vec::new();
        for fragment in order.into_iter().map(|i| &fragments[i]) {
            let pieces = split_pieces(&fragment.text);
            let total = fragment.text.chars().count();
            for piece in &pieces {
                let bbox = if pieces.len() == 1 {
                    fragment.bbox
                } else {
                    let first = fragment.text[..piece.start].chars().count();
                    let last = fragment.text[..piece.end].chars().count();
                    fragment.bbox.char_slice(first, last, total)
                };
                let index = tokens.len();
                tokens.push(Token {
                    id: TokenId(index),
                    text: fragment.text[piece.start..piece.end].to_string(),
                    bbox,
                    kind: piece.kind,
                    reading_order_index: index,
                    confidence: fragment.confidence,
                });
            }
        }

        debug!(
            raw = raw.len(),
            tokens = tokens.len(),
            malformed = rejections.len(),
            "normalized OCR tokens"
        );
        NormalizedTokens { tokens, rejections }
    }

    /// Input order when every fragment carries an index, else band order.
    fn reading_order(&self, fragments: &[Fragment]) -> Vec<usize> {
        if fragments.iter().all(|f| f.raw_order.is_some()) {
            let mut order: Vec<usize> = (0..fragments.len()).collect();
            order.sort_by_key(|&i| (fragments[i].raw_order, fragments[i].position));
            order
        } else {
            let boxes: Vec<BBox> = fragments.iter().map(|f| f.bbox).collect();
            row_bands(&boxes, self.config.band_overlap_fraction).concat()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Vertex;
    use pretty_assertions::assert_eq;

    fn pieces(text: &str) -> Vec<(String, TokenKind)> {
        split_pieces(text)
            .into_iter()
            .map(|p| (text[p.start..p.end].to_string(), p.kind))
            .collect()
    }

    fn normalize(raw: &[RawToken]) -> NormalizedTokens {
        let config = ExtractionConfig::default();
        TokenNormalizer::new(&config, &NoCorrection).normalize(raw)
    }

    #[test]
    fn test_fold_width() {
        assert_eq!(fold_width("１９８円"), "198円");
        assert_eq!(fold_width("￥１，９８０"), "¥1,980");
        assert_eq!(fold_width("＼１９８"), "¥198");
        assert_eq!(fold_width("（税抜）"), "(税抜)");
        assert_eq!(fold_width("天然水\u{3000}２Ｌ"), "天然水 2L");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("198円"), TokenKind::Numeric);
        assert_eq!(classify("2L"), TokenKind::Numeric);
        assert_eq!(classify("2024/03/15"), TokenKind::Numeric);
        assert_eq!(classify("1,"), TokenKind::Numeric);
        assert_eq!(classify("税込"), TokenKind::Symbol);
        assert_eq!(classify("100gあたり"), TokenKind::Symbol);
        assert_eq!(classify("%OFF"), TokenKind::Symbol);
        assert_eq!(classify("・"), TokenKind::Symbol);
        assert_eq!(classify("きゅうり3本"), TokenKind::Text);
    }

    #[test]
    fn test_split_currency_and_markers() {
        assert_eq!(
            pieces("¥198"),
            vec![("¥".to_string(), TokenKind::Symbol), ("198".to_string(), TokenKind::Numeric)]
        );
        assert_eq!(
            pieces("(税抜90円)"),
            vec![("(税抜".to_string(), TokenKind::Symbol), ("90円".to_string(), TokenKind::Numeric)]
        );
        assert_eq!(
            pieces("298円(税込)"),
            vec![("298円".to_string(), TokenKind::Numeric), ("(税込)".to_string(), TokenKind::Symbol)]
        );
        assert_eq!(
            pieces("本体価格 ¥1,280"),
            vec![
                ("本体価格".to_string(), TokenKind::Symbol),
                ("¥".to_string(), TokenKind::Symbol),
                ("1,280".to_string(), TokenKind::Numeric),
            ]
        );
    }

    #[test]
    fn test_split_text_then_price() {
        assert_eq!(
            pieces("きゅうり3本 198円"),
            vec![("きゅうり3本".to_string(), TokenKind::Text), ("198円".to_string(), TokenKind::Numeric)]
        );
        assert_eq!(pieces("サントリー天然水 2L"), vec![("サントリー天然水 2L".to_string(), TokenKind::Text)]);
    }

    #[test]
    fn test_replacement_corrector() {
        let mut table = BTreeMap::new();
        table.insert("O円".to_string(), "0円".to_string());
        table.insert("l98".to_string(), "198".to_string());
        let corrector = ReplacementCorrector::new(&table);

        assert_eq!(corrector.correct("l98円"), "198円");
        assert_eq!(corrector.correct("1OO円").as_ref(), "1O0円");
        assert!(matches!(corrector.correct("きゅうり"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_drops_whitespace_and_malformed_tokens() {
        let raw = vec![
            RawToken::rect("きゅうり", 0.0, 0.0, 80.0, 30.0),
            RawToken::rect(" \u{3000} ", 100.0, 0.0, 150.0, 30.0),
            RawToken::new("線", vec![Vertex::new(0.0, 50.0), Vertex::new(10.0, 50.0)]),
            RawToken::rect("点", 5.0, 60.0, 5.0, 90.0),
        ];

        let normalized = normalize(&raw);
        assert_eq!(normalized.tokens.len(), 1);
        assert_eq!(normalized.tokens[0].text, "きゅうり");
        assert_eq!(normalized.rejections.len(), 2);
        assert!(normalized
            .rejections
            .iter()
            .all(|r| r.reason == RejectionReason::MalformedToken));
    }

    #[test]
    fn test_split_tokens_get_proportional_boxes() {
        let raw = vec![RawToken::rect("¥198", 0.0, 0.0, 40.0, 20.0)];

        let normalized = normalize(&raw);
        let tokens = &normalized.tokens;
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].bbox, BBox::new(0.0, 0.0, 10.0, 20.0));
        assert_eq!(tokens[1].bbox, BBox::new(10.0, 0.0, 40.0, 20.0));
        assert_eq!(tokens[1].reading_order_index, 1);
    }

    #[test]
    fn test_reading_order_derived_from_bands() {
        let raw = vec![
            RawToken::rect("下", 0.0, 100.0, 50.0, 130.0),
            RawToken::rect("右", 200.0, 2.0, 250.0, 32.0),
            RawToken::rect("左", 0.0, 0.0, 50.0, 30.0),
        ];

        let normalized = normalize(&raw);
        let texts: Vec<_> = normalized.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["左", "右", "下"]);
        let ids: Vec<_> = normalized.tokens.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_reading_order_from_input_when_complete() {
        let raw = vec![
            RawToken::rect("a", 0.0, 100.0, 50.0, 130.0).with_reading_order(7),
            RawToken::rect("b", 200.0, 2.0, 250.0, 32.0).with_reading_order(3),
        ];

        let normalized = normalize(&raw);
        let texts: Vec<_> = normalized.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a"]);
        assert_eq!(normalized.tokens[1].reading_order_index, 1);
    }
}
