//! Quantity expressions in product names and per-unit price markers.

use super::patterns::{PER_UNIT_MARKER, QUANTITY_IN_TEXT};
use super::{ExtractionMatch, FieldExtractor};

/// Quantity extractor ("3本", "2L", "100g").
pub struct QuantityExtractor;

impl QuantityExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for QuantityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for QuantityExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        QUANTITY_IN_TEXT
            .captures_iter(text)
            .filter_map(|caps| caps.name("qty"))
            .map(|m| {
                let compact: String = m.as_str().split_whitespace().collect();
                ExtractionMatch::new(compact, m.as_str()).with_position(m.start(), m.end())
            })
            .collect()
    }
}

/// The unit of a product name: its last quantity expression.
pub fn extract_unit(text: &str) -> Option<String> {
    QuantityExtractor::new()
        .extract_all(text)
        .pop()
        .map(|m| m.value)
}

/// Basis of a per-unit marker ("100gあたり" → "100g").
pub fn per_unit_basis(text: &str) -> Option<String> {
    let caps = PER_UNIT_MARKER.captures(text)?;
    Some(caps["basis"].split_whitespace().collect())
}
