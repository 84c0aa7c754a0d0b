//! Price/product extraction from positioned OCR tokens.

mod engine;
pub mod normalizer;
pub mod pairer;
pub mod prices;
pub mod rules;
pub mod scorer;
pub mod spatial;
pub mod validator;

pub use engine::PriceExtractionEngine;
pub use normalizer::{NoCorrection, ReplacementCorrector, TextCorrector, TokenNormalizer};
pub use pairer::{CandidateState, Pairer, PairingKey};
pub use prices::PriceParser;
pub use scorer::{BandRelation, ConfidenceScorer, PairEvidence};
pub use spatial::{Direction, Neighbor, SpatialIndex};
pub use validator::RecordValidator;

use crate::error::ExtractionError;
use crate::models::record::ExtractionOutput;
use crate::ocr::{OcrPage, RawToken};

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Trait for flyer price extractors.
pub trait FlyerExtractor {
    /// Extract records from one image's OCR output.
    fn extract(&self, page: &OcrPage) -> Result<ExtractionOutput>;

    /// Extract records from a bare token list.
    fn extract_tokens(&self, tokens: &[RawToken]) -> Result<ExtractionOutput>;
}
