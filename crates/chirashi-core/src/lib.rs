//! Core library for Japanese retail flyer price extraction.
//!
//! This crate provides:
//! - OCR token input contract (positioned text fragments)
//! - Token normalization, row-band spatial index and price parsing
//! - Price-to-product pairing with confidence scoring and validation
//! - Keyword product categorization and flat output rows

pub mod categorize;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;

pub use categorize::{CategoryResult, KeywordCategorizer};
pub use error::{ChirashiError, ExtractionError, Result};
pub use extract::{FlyerExtractor, PriceExtractionEngine, TextCorrector};
pub use models::config::{ChirashiConfig, ConfidenceWeights, DistanceMetric, ExtractionConfig, OutputConfig};
pub use models::entry::{Category, FlyerEntry};
pub use models::record::{
    ExtractionOutput, ExtractionRecord, PriceCandidate, ProductSpan, RecordViolation, Rejection, RejectionReason,
    TaxRate, TaxVariant,
};
pub use ocr::{BBox, OcrPage, RawToken, Vertex};
