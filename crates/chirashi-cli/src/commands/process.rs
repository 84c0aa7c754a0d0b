//! Process command - extract prices from a single OCR token file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use chirashi_core::{ExtractionError, ExtractionOutput, FlyerExtractor, KeywordCategorizer, OcrPage, PriceExtractionEngine};

use super::load_config;
use super::output::{format_report, FlyerReport, OutputFormat};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// OCR token file (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Drop records below this confidence (default: from config)
    #[arg(long)]
    min_confidence: Option<f32>,

    /// List rejected tokens, prices and records
    #[arg(long)]
    show_rejections: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let engine = PriceExtractionEngine::new(config.extraction.clone())?;
    let output = extract_file(&engine, &args.input)?;

    let min_confidence = args.min_confidence.unwrap_or(config.output.min_confidence);
    let include_rejections = args.show_rejections
        || (args.format == OutputFormat::Json && config.output.include_rejections);
    let report = FlyerReport::build(output, &KeywordCategorizer::new(), min_confidence, include_rejections);

    let formatted = format_report(&report, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &formatted)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", formatted);
    }

    if args.show_rejections && args.format == OutputFormat::Csv {
        for rejection in &report.rejections {
            eprintln!("{} {}: {}", style("✗").red(), rejection.reason, rejection.text);
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Load one token dump and run the engine on it.
pub fn extract_file(engine: &PriceExtractionEngine, path: &Path) -> anyhow::Result<ExtractionOutput> {
    let page = OcrPage::from_file(path)?;

    match engine.extract(&page) {
        Ok(output) => Ok(output),
        Err(ExtractionError::EmptyInput) => {
            anyhow::bail!("No OCR tokens in {}: nothing to extract", path.display())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirashi_core::ExtractionConfig;

    #[test]
    fn test_empty_token_file_has_distinct_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "[]").unwrap();

        let engine = PriceExtractionEngine::new(ExtractionConfig::default()).unwrap();
        let err = extract_file(&engine, &path).unwrap_err();
        assert!(err.to_string().contains("No OCR tokens"));
    }
}
