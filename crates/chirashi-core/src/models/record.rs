//! Extraction results: price candidates, product spans and records.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::token::TokenId;
use crate::ocr::BBox;

/// How a price is displayed with respect to consumption tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxVariant {
    /// Tax-included (税込), the prominent figure on most flyers.
    IncludedTax,
    /// Tax-excluded (税抜, 本体価格).
    ExcludedTax,
    /// No currency or tax marker next to the number.
    Unknown,
}

/// Japanese consumption tax rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxRate {
    /// Reduced rate for food and beverages: 8%
    #[serde(rename = "8")]
    Reduced8,

    /// Standard rate: 10%
    #[serde(rename = "10")]
    Standard10,
}

impl TaxRate {
    pub const ALL: [TaxRate; 2] = [TaxRate::Reduced8, TaxRate::Standard10];

    /// The rate as a decimal multiplier (e.g. 0.08 for 8%).
    pub fn as_decimal(&self) -> Decimal {
        match self {
            TaxRate::Reduced8 => Decimal::new(8, 2),
            TaxRate::Standard10 => Decimal::new(10, 2),
        }
    }

    pub fn display(&self) -> String {
        match self {
            TaxRate::Reduced8 => "8%".to_string(),
            TaxRate::Standard10 => "10%".to_string(),
        }
    }
}

/// Index of a price candidate in the per-image candidate arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub usize);

/// Index of a product span in the per-image span arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(pub usize);

/// A parsed price not yet linked to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub id: CandidateId,

    /// Whole-yen amount.
    pub amount: i64,

    pub tax_variant: TaxVariant,

    /// Set when the variant was inferred from a dual display rather than
    /// read from a marker.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub variant_inferred: bool,

    /// Quantity the price refers to ("100g" for "100gあたり 198円").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_basis: Option<String>,

    /// Numeric, currency and marker tokens this price was read from.
    pub source_tokens: Vec<TokenId>,

    /// Union of the source token boxes.
    pub bbox: BBox,

    /// Source text as printed.
    pub text: String,

    /// Candidates sharing a group are mutually exclusive readings of the
    /// same tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_group: Option<usize>,

    /// Row band of the number itself.
    #[serde(skip)]
    pub band: usize,
}

impl PriceCandidate {
    /// Whether an explicit currency or tax marker backs the variant.
    pub fn has_explicit_marker(&self) -> bool {
        self.tax_variant != TaxVariant::Unknown && !self.variant_inferred
    }
}

/// A run of text tokens naming one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpan {
    pub id: SpanId,
    pub text: String,
    pub bbox: BBox,
    pub source_tokens: Vec<TokenId>,
}

impl ProductSpan {
    /// Character count ignoring whitespace.
    pub fn text_len(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// A product with its tax-included and/or tax-excluded price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub product: ProductSpan,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_incl: Option<PriceCandidate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_excl: Option<PriceCandidate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Pairing confidence (0.0 - 1.0).
    pub confidence: f32,

    /// Consumption tax rate consistent with both displayed prices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<TaxRate>,
}

impl ExtractionRecord {
    pub fn product_text(&self) -> &str {
        &self.product.text
    }

    pub fn price_incl_amount(&self) -> Option<i64> {
        self.price_incl.as_ref().map(|p| p.amount)
    }

    pub fn price_excl_amount(&self) -> Option<i64> {
        self.price_excl.as_ref().map(|p| p.amount)
    }

    /// All prices held by this record.
    pub fn prices(&self) -> impl Iterator<Item = &PriceCandidate> {
        self.price_incl.iter().chain(self.price_excl.iter())
    }
}

/// Rule broken by a paired record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordViolation {
    /// A price is zero or negative.
    NonPositiveAmount,
    /// A price exceeds the configured sanity ceiling.
    AmountAboveCeiling,
    /// The product text is empty after trimming.
    EmptyProduct,
    /// The tax-included price is below the tax-excluded one.
    TaxInversion,
}

/// Why something was left out of the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Token polygon was unusable; the token was dropped.
    MalformedToken,
    /// Numeric run did not read as a price.
    UnparseablePrice,
    /// Price with no plausible product nearby.
    OrphanPrice,
    /// Paired record failed validation.
    InvalidRecord(RecordViolation),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MalformedToken => write!(f, "malformed token"),
            RejectionReason::UnparseablePrice => write!(f, "unparseable price"),
            RejectionReason::OrphanPrice => write!(f, "orphan price"),
            RejectionReason::InvalidRecord(violation) => {
                let rule = match violation {
                    RecordViolation::NonPositiveAmount => "non-positive amount",
                    RecordViolation::AmountAboveCeiling => "amount above ceiling",
                    RecordViolation::EmptyProduct => "empty product",
                    RecordViolation::TaxInversion => "tax-included below tax-excluded",
                };
                write!(f, "invalid record ({})", rule)
            }
        }
    }
}

/// A rejected token, price or record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectionReason,

    /// Offending price or product text.
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Rejection {
    pub fn new(reason: RejectionReason, text: impl Into<String>) -> Self {
        Self {
            reason,
            text: text.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Records and rejections for one flyer image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub records: Vec<ExtractionRecord>,

    #[serde(default)]
    pub rejections: Vec<Rejection>,
}

impl ExtractionOutput {
    /// Rejections with the given reason.
    pub fn rejections_for(&self, reason: RejectionReason) -> impl Iterator<Item = &Rejection> {
        self.rejections.iter().filter(move |r| r.reason == reason)
    }

    /// Drop records below `min_confidence`, returning how many were removed.
    pub fn retain_confident(&mut self, min_confidence: f32) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.confidence >= min_confidence);
        before - self.records.len()
    }
}
