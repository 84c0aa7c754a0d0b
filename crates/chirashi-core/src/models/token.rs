//! Normalized OCR tokens.

use serde::{Deserialize, Serialize};

use crate::ocr::BBox;

/// Index of a token in the per-image token arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub usize);

/// Coarse token class assigned during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Digits, optionally with a unit suffix ("198円", "2L") or joined by
    /// date/time separators.
    Numeric,
    /// Free text, candidate material for product names.
    Text,
    /// Currency signs, tax and per-unit markers, bare punctuation.
    Symbol,
}

/// A cleaned OCR fragment. Immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub text: String,
    pub bbox: BBox,
    pub kind: TokenKind,
    /// Dense 0..n reading order across the image.
    pub reading_order_index: usize,
    /// Recognition confidence carried over from the OCR collaborator.
    pub confidence: f32,
}

impl Token {
    pub fn is_text(&self) -> bool {
        self.kind == TokenKind::Text
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == TokenKind::Numeric
    }

    pub fn is_symbol(&self) -> bool {
        self.kind == TokenKind::Symbol
    }

    pub fn height(&self) -> f32 {
        self.bbox.height()
    }
}
