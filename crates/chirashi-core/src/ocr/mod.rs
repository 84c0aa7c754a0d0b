//! Input contract with the OCR collaborator.
//!
//! The engine never talks to an OCR backend itself: it consumes the token
//! dump (text + polygon + confidence) that Vision, Tesseract or an LLM
//! re-extraction step produced for one flyer image.

mod geometry;

pub use geometry::BBox;

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A polygon corner in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "VertexRepr")]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

impl Vertex {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Vertices arrive either as `[x, y]` pairs or as `{"x": .., "y": ..}`
/// objects. Vision omits zero coordinates, hence the defaults.
#[derive(Deserialize)]
#[serde(untagged)]
enum VertexRepr {
    Pair([f32; 2]),
    Point {
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
    },
}

impl From<VertexRepr> for Vertex {
    fn from(repr: VertexRepr) -> Self {
        match repr {
            VertexRepr::Pair([x, y]) => Vertex { x, y },
            VertexRepr::Point { x, y } => Vertex { x, y },
        }
    }
}

fn default_confidence() -> f32 {
    1.0
}

/// One text fragment as reported by the OCR collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToken {
    /// Recognized text.
    #[serde(alias = "description")]
    pub text: String,

    /// Bounding polygon (normally 4 corners).
    #[serde(default)]
    pub vertices: Vec<Vertex>,

    /// Recognition confidence (0.0 - 1.0).
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    /// Position in the OCR engine's reading order, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_order_index: Option<u32>,

    /// Axis-aligned box (x1, y1, x2, y2), used when `vertices` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<[f32; 4]>,
}

impl RawToken {
    pub fn new(text: impl Into<String>, vertices: Vec<Vertex>) -> Self {
        Self {
            text: text.into(),
            vertices,
            confidence: 1.0,
            reading_order_index: None,
            bounding_box: None,
        }
    }

    /// Token with a rectangular polygon.
    pub fn rect(text: impl Into<String>, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(
            text,
            vec![
                Vertex::new(x1, y1),
                Vertex::new(x2, y1),
                Vertex::new(x2, y2),
                Vertex::new(x1, y2),
            ],
        )
    }

    pub fn with_reading_order(mut self, index: u32) -> Self {
        self.reading_order_index = Some(index);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// The polygon to use for geometry, synthesized from `bounding_box`
    /// when no vertices were supplied.
    pub fn polygon(&self) -> Cow<'_, [Vertex]> {
        match (&self.bounding_box, self.vertices.is_empty()) {
            (Some([x1, y1, x2, y2]), true) => Cow::Owned(vec![
                Vertex::new(*x1, *y1),
                Vertex::new(*x2, *y1),
                Vertex::new(*x2, *y2),
                Vertex::new(*x1, *y2),
            ]),
            _ => Cow::Borrowed(&self.vertices),
        }
    }
}

/// OCR output for a single flyer image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// Where the tokens came from (image path, OCR engine name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Recognized tokens, in any order.
    #[serde(default, alias = "text_annotations")]
    pub tokens: Vec<RawToken>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OcrInput {
    Page(OcrPage),
    Tokens(Vec<RawToken>),
}

impl OcrPage {
    pub fn new(tokens: Vec<RawToken>) -> Self {
        Self {
            source: None,
            tokens,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Parse a token dump: either a page object or a bare token array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str::<OcrInput>(json)? {
            OcrInput::Page(page) => page,
            OcrInput::Tokens(tokens) => OcrPage::new(tokens),
        })
    }

    /// Load a token dump from a JSON file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut page = Self::from_json(&content)?;
        if page.source.is_none() {
            page.source = Some(path.display().to_string());
        }
        Ok(page)
    }
}
