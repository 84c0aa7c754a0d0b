//! Text-level rules for Japanese flyer price notation.

pub mod amounts;
pub mod patterns;
pub mod tax;
pub mod units;

pub use amounts::{format_yen, parse_yen_amount, read_numeric, NonPrice, NumericReading};
pub use tax::{
    calculate_incl, detect_tax_marker, infer_tax_rate, is_plausible_pair, TaxMarker,
    TaxMarkerExtractor,
};
pub use units::{extract_unit, per_unit_basis, QuantityExtractor};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value found in text, with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    pub value: T,
    /// Byte range in the source text.
    pub position: Option<(usize, usize)>,
    /// Matched text.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, source: impl Into<String>) -> Self {
        Self {
            value,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
