//! Configuration structures for the extraction pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Main configuration for the chirashi pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChirashiConfig {
    /// Extraction engine tunables.
    pub extraction: ExtractionConfig,

    /// Output and filtering configuration.
    pub output: OutputConfig,
}

/// How the distance between a price and a product is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance between box centers.
    #[default]
    Center,
    /// Euclidean distance between the closest box edges.
    Edge,
}

/// Weights of the pairing confidence signals. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub distance: f32,
    pub band_alignment: f32,
    pub tax_marker: f32,
    pub text_length: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            distance: 0.4,
            band_alignment: 0.3,
            tax_marker: 0.2,
            text_length: 0.1,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f32 {
        self.distance + self.band_alignment + self.tax_marker + self.text_length
    }
}

/// Extraction engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Two tokens share a row band when their vertical overlap exceeds this
    /// fraction of the shorter token's height.
    pub band_overlap_fraction: f32,

    /// Pairing radius as a multiple of the price box height.
    pub max_distance_multiplier: f32,

    /// Distance measure used for pairing and scoring.
    pub distance_metric: DistanceMetric,

    /// Confidence signal weights.
    pub weights: ConfidenceWeights,

    /// Largest accepted price in yen.
    pub price_ceiling: i64,

    /// Product text length that earns the full text-length score.
    pub reference_text_length: usize,

    /// Max gap between text tokens of one product name, in band heights.
    pub run_gap_factor: f32,

    /// Max gap between a number and its currency/tax marker, in number heights.
    pub marker_gap_factor: f32,

    /// Max gap across which a split thousands group is joined, in heights.
    pub join_gap_factor: f32,

    /// Digit runs longer than this are phone numbers, not prices.
    pub max_price_digits: usize,

    /// Polygons enclosing less area are dropped as malformed.
    pub min_polygon_area: f32,

    /// Literal replacements applied to raw OCR text before classification.
    pub corrections: BTreeMap<String, String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            band_overlap_fraction: 0.5,
            max_distance_multiplier: 2.5,
            distance_metric: DistanceMetric::Center,
            weights: ConfidenceWeights::default(),
            price_ceiling: 1_000_000,
            reference_text_length: 6,
            run_gap_factor: 1.0,
            marker_gap_factor: 1.5,
            join_gap_factor: 0.35,
            max_price_digits: 7,
            min_polygon_area: 1.0,
            corrections: BTreeMap::new(),
        }
    }
}

impl ExtractionConfig {
    /// Check every tunable is within its allowed range.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if !(self.band_overlap_fraction > 0.0 && self.band_overlap_fraction <= 1.0) {
            return Err(ExtractionError::invalid_config(
                "band_overlap_fraction",
                format!("must be in (0, 1], got {}", self.band_overlap_fraction),
            ));
        }

        let positive = [
            ("max_distance_multiplier", self.max_distance_multiplier),
            ("run_gap_factor", self.run_gap_factor),
            ("marker_gap_factor", self.marker_gap_factor),
            ("join_gap_factor", self.join_gap_factor),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ExtractionError::invalid_config(
                    field,
                    format!("must be positive, got {}", value),
                ));
            }
        }

        let weights = [
            ("weights.distance", self.weights.distance),
            ("weights.band_alignment", self.weights.band_alignment),
            ("weights.tax_marker", self.weights.tax_marker),
            ("weights.text_length", self.weights.text_length),
        ];
        for (field, value) in weights {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ExtractionError::invalid_config(
                    field,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        if (self.weights.sum() - 1.0).abs() > 1e-3 {
            return Err(ExtractionError::invalid_config(
                "weights",
                format!("must sum to 1, got {:.3}", self.weights.sum()),
            ));
        }

        if self.price_ceiling <= 0 {
            return Err(ExtractionError::invalid_config(
                "price_ceiling",
                "must be positive",
            ));
        }
        if self.reference_text_length == 0 {
            return Err(ExtractionError::invalid_config(
                "reference_text_length",
                "must be at least 1",
            ));
        }
        if self.max_price_digits == 0 {
            return Err(ExtractionError::invalid_config(
                "max_price_digits",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Records below this confidence are left out of the output.
    pub min_confidence: f32,

    /// Prefix of generated output file names.
    pub filename_prefix: String,

    /// Include rejections in JSON output.
    pub include_rejections: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            filename_prefix: "chirashi_result".to_string(),
            include_rejections: true,
        }
    }
}

impl ChirashiConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
