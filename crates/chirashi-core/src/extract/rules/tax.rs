//! Consumption tax markers and rate arithmetic.

use rust_decimal::Decimal;

use crate::models::record::{TaxRate, TaxVariant};

use super::amounts::whole_yen;
use super::patterns::{CURRENCY_SYMBOL, MARKER_TOKEN, TAX_EXCLUDED, TAX_INCLUDED};
use super::{ExtractionMatch, FieldExtractor};

/// Largest incl/excl ratio accepted for an inferred dual display.
const MAX_PAIR_RATIO: Decimal = Decimal::from_parts(111, 0, 0, false, 2);

/// A tax display marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxMarker {
    /// 税込, 税込価格
    Included,
    /// 税抜, 税別, 本体価格
    Excluded,
}

impl TaxMarker {
    pub fn variant(&self) -> TaxVariant {
        match self {
            TaxMarker::Included => TaxVariant::IncludedTax,
            TaxMarker::Excluded => TaxVariant::ExcludedTax,
        }
    }
}

/// Finds tax markers anywhere in a text.
pub struct TaxMarkerExtractor;

impl TaxMarkerExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TaxMarkerExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TaxMarkerExtractor {
    type Output = ExtractionMatch<TaxMarker>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let included = TAX_INCLUDED
            .find_iter(text)
            .map(|m| (m, TaxMarker::Included));
        let excluded = TAX_EXCLUDED
            .find_iter(text)
            .map(|m| (m, TaxMarker::Excluded));

        let mut results: Vec<_> = included
            .chain(excluded)
            .map(|(m, marker)| {
                ExtractionMatch::new(marker, m.as_str()).with_position(m.start(), m.end())
            })
            .collect();
        results.sort_by_key(|m| m.position);
        results
    }
}

/// The marker of a standalone marker token ("税抜", "(税込)").
pub fn detect_tax_marker(text: &str) -> Option<TaxMarker> {
    let caps = MARKER_TOKEN.captures(text)?;
    TaxMarkerExtractor::new()
        .extract(&caps["marker"])
        .map(|m| m.value)
}

/// Whether the token is a bare currency sign or yen suffix.
pub fn is_currency_symbol(text: &str) -> bool {
    CURRENCY_SYMBOL.is_match(text)
}

/// Tax-included price for a tax-excluded amount, truncated to whole yen.
pub fn calculate_incl(excl: i64, rate: TaxRate) -> Option<i64> {
    let gross = Decimal::from(excl) * (Decimal::ONE + rate.as_decimal());
    whole_yen(gross)
}

/// The consumption tax rate linking both prices, allowing one yen of
/// rounding slack.
pub fn infer_tax_rate(incl: i64, excl: i64) -> Option<TaxRate> {
    TaxRate::ALL.into_iter().find(|&rate| {
        calculate_incl(excl, rate)
            .map(|expected| (expected - incl).abs() <= 1)
            .unwrap_or(false)
    })
}

/// Whether two amounts can be the tax-included and tax-excluded prices of
/// one product.
pub fn is_plausible_pair(incl: i64, excl: i64) -> bool {
    if excl <= 0 || incl < excl {
        return false;
    }
    Decimal::from(incl) / Decimal::from(excl) <= MAX_PAIR_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_tax_marker() {
        assert_eq!(detect_tax_marker("税抜"), Some(TaxMarker::Excluded));
        assert_eq!(detect_tax_marker("(税込)"), Some(TaxMarker::Included));
        assert_eq!(detect_tax_marker("【本体価格】"), Some(TaxMarker::Excluded));
        assert_eq!(detect_tax_marker("税込価格"), Some(TaxMarker::Included));
        assert_eq!(detect_tax_marker("税別"), Some(TaxMarker::Excluded));
        assert_eq!(detect_tax_marker("きゅうり"), None);
    }

    #[test]
    fn test_extract_all_markers() {
        let matches = TaxMarkerExtractor::new().extract_all("本体価格1,000円 税込1,100円");
        let markers: Vec<_> = matches.iter().map(|m| m.value).collect();
        assert_eq!(markers, vec![TaxMarker::Excluded, TaxMarker::Included]);
    }

    #[test]
    fn test_currency_symbol() {
        assert!(is_currency_symbol("¥"));
        assert!(is_currency_symbol("円"));
        assert!(!is_currency_symbol("¥198"));
    }

    #[test]
    fn test_infer_tax_rate() {
        assert_eq!(calculate_incl(90, TaxRate::Reduced8), Some(97));
        assert_eq!(infer_tax_rate(98, 90), Some(TaxRate::Reduced8));
        assert_eq!(infer_tax_rate(1100, 1000), Some(TaxRate::Standard10));
        assert_eq!(infer_tax_rate(213, 198), Some(TaxRate::Reduced8));
        assert_eq!(infer_tax_rate(150, 100), None);
    }

    #[test]
    fn test_plausible_pair() {
        assert!(is_plausible_pair(98, 90));
        assert!(is_plausible_pair(100, 100));
        assert!(is_plausible_pair(1110, 1000));
        assert!(!is_plausible_pair(1200, 1000));
        assert!(!is_plausible_pair(90, 98));
        assert!(!is_plausible_pair(98, 0));
    }
}
