//! Report building and formatting shared by `process` and `batch`.

use serde::Serialize;

use chirashi_core::extract::rules::format_yen;
use chirashi_core::{ExtractionOutput, FlyerEntry, KeywordCategorizer, Rejection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Categorized rows for one flyer image, ready to serialize.
#[derive(Debug, Serialize)]
pub struct FlyerReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub entries: Vec<FlyerEntry>,

    /// Records dropped by the confidence threshold.
    pub below_threshold: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejections: Vec<Rejection>,
}

impl FlyerReport {
    /// Filter by confidence and attach a category to every surviving record.
    pub fn build(
        mut output: ExtractionOutput,
        categorizer: &KeywordCategorizer,
        min_confidence: f32,
        include_rejections: bool,
    ) -> Self {
        let below_threshold = output.retain_confident(min_confidence);
        let entries = output
            .records
            .iter()
            .map(|record| {
                let category = categorizer.categorize(record.product_text()).category;
                FlyerEntry::from_record(record, category)
            })
            .collect();

        Self {
            source: output.source,
            entries,
            below_threshold,
            rejections: if include_rejections { output.rejections } else { Vec::new() },
        }
    }
}

pub fn format_report(report: &FlyerReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => format_csv(&report.entries),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

pub fn format_csv(entries: &[FlyerEntry]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["商品名", "税込価格", "税抜価格", "単位", "カテゴリ", "信頼度"])?;

    for entry in entries {
        wtr.write_record([
            entry.product.as_str(),
            &entry.price_incl_tax.map(|p| p.to_string()).unwrap_or_default(),
            &entry.price_excl_tax.map(|p| p.to_string()).unwrap_or_default(),
            entry.unit.as_deref().unwrap_or(""),
            entry.category.label(),
            &format!("{:.2}", entry.confidence),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

pub fn format_text(report: &FlyerReport) -> String {
    let mut output = String::new();

    if let Some(source) = &report.source {
        output.push_str(&format!("Flyer: {}\n\n", source));
    }

    if report.entries.is_empty() {
        output.push_str("No products found.\n");
    }

    for entry in &report.entries {
        output.push_str(&entry.product);
        if let Some(unit) = &entry.unit {
            output.push_str(&format!(" ({})", unit));
        }
        output.push('\n');
        if let Some(incl) = entry.price_incl_tax {
            output.push_str(&format!("  税込: {}\n", format_yen(incl)));
        }
        if let Some(excl) = entry.price_excl_tax {
            output.push_str(&format!("  税抜: {}\n", format_yen(excl)));
        }
        if let Some(rate) = entry.tax_rate {
            output.push_str(&format!("  税率: {}\n", rate.display()));
        }
        output.push_str(&format!(
            "  {} / {:.0}%\n",
            entry.category.label(),
            entry.confidence * 100.0
        ));
    }

    if report.below_threshold > 0 {
        output.push_str(&format!(
            "\n{} record(s) below the confidence threshold\n",
            report.below_threshold
        ));
    }

    if !report.rejections.is_empty() {
        output.push_str("\nRejected:\n");
        for rejection in &report.rejections {
            output.push_str(&format!("  - {}: {}", rejection.reason, rejection.text));
            if let Some(detail) = &rejection.detail {
                output.push_str(&format!(" ({})", detail));
            }
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirashi_core::{Category, TaxRate};

    fn entry(product: &str, incl: Option<i64>, excl: Option<i64>) -> FlyerEntry {
        FlyerEntry {
            product: product.to_string(),
            price_incl_tax: incl,
            price_excl_tax: excl,
            unit: Some("2L".to_string()),
            category: Category::Food,
            confidence: 0.8,
            tax_rate: None,
        }
    }

    #[test]
    fn test_csv_has_japanese_headers_and_blank_missing_prices() {
        let csv = format_csv(&[entry("天然水", Some(98), None)]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("商品名,税込価格,税抜価格,単位,カテゴリ,信頼度"));
        assert_eq!(lines.next(), Some("天然水,98,,2L,食品,0.80"));
    }

    #[test]
    fn test_text_lists_prices_and_rejections() {
        let mut dual = entry("天然水", Some(1980), Some(1800));
        dual.tax_rate = Some(TaxRate::Standard10);
        let report = FlyerReport {
            source: None,
            entries: vec![dual],
            below_threshold: 1,
            rejections: vec![Rejection::new(
                chirashi_core::RejectionReason::OrphanPrice,
                "500円",
            )],
        };
        let text = format_text(&report);
        assert!(text.contains("税込: 1,980円"));
        assert!(text.contains("税抜: 1,800円"));
        assert!(text.contains("税率: 10%"));
        assert!(text.contains("1 record(s) below"));
        assert!(text.contains("orphan price: 500円"));
    }
}
