//! Pairing confidence.

use crate::models::config::{ConfidenceWeights, ExtractionConfig};

/// Row relation between a price and the evidence it was paired through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandRelation {
    Same,
    Adjacent,
    Distant,
}

impl BandRelation {
    pub fn between(a: usize, b: usize) -> Self {
        match a.abs_diff(b) {
            0 => BandRelation::Same,
            1 => BandRelation::Adjacent,
            _ => BandRelation::Distant,
        }
    }

    fn score(&self) -> f32 {
        match self {
            BandRelation::Same => 1.0,
            BandRelation::Adjacent => 0.5,
            BandRelation::Distant => 0.0,
        }
    }
}

/// The evidence behind one price-to-product link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEvidence {
    pub distance: f32,
    pub max_distance: f32,
    pub band: BandRelation,
    /// Currency or tax marker printed with the price.
    pub explicit_marker: bool,
    /// Product text length, whitespace excluded.
    pub text_len: usize,
}

/// Weighted combination of independent pairing signals.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
    reference_text_length: usize,
}

impl ConfidenceScorer {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            weights: config.weights,
            reference_text_length: config.reference_text_length.max(1),
        }
    }

    /// Confidence of a single link, in [0, 1].
    pub fn score(&self, evidence: &PairEvidence) -> f32 {
        let distance = if evidence.max_distance > 0.0 {
            1.0 - (evidence.distance / evidence.max_distance).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let marker = if evidence.explicit_marker { 1.0 } else { 0.5 };
        let length = (evidence.text_len as f32 / self.reference_text_length as f32).min(1.0);

        let w = &self.weights;
        let total = w.distance * distance
            + w.band_alignment * evidence.band.score()
            + w.tax_marker * marker
            + w.text_length * length;
        total.clamp(0.0, 1.0)
    }

    /// Confidence of a record: the mean of its link scores.
    pub fn score_record<'e>(&self, links: impl IntoIterator<Item = &'e PairEvidence>) -> f32 {
        let scores: Vec<f32> = links.into_iter().map(|e| self.score(e)).collect();
        if scores.is_empty() {
            return 0.0;
        }
        (scores.iter().sum::<f32>() / scores.len() as f32).clamp(0.0, 1.0)
    }
}
