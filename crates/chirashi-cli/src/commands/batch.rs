//! Batch processing command for multiple OCR token files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use chirashi_core::{KeywordCategorizer, OutputConfig, PriceExtractionEngine};

use super::load_config;
use super::output::{format_report, FlyerReport, OutputFormat};
use super::process::extract_file;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching OCR token files
    #[arg(required = true)]
    input: String,

    /// Output directory (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    report: Option<FlyerReport>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)?;

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let engine = Arc::new(PriceExtractionEngine::new(config.extraction.clone())?);
    let categorizer = Arc::new(KeywordCategorizer::new());
    let output_config = Arc::new(config.output.clone());
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut join_set = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        let engine = engine.clone();
        let categorizer = categorizer.clone();
        let output_config = output_config.clone();
        let semaphore = semaphore.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let file_start = Instant::now();

            let task_path = path.clone();
            let result = tokio::task::spawn_blocking(move || {
                process_single_file(&task_path, &engine, &categorizer, &output_config)
            })
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r);

            (index, path, result, file_start.elapsed().as_millis() as u64)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        let (index, path, result, processing_time_ms) = joined?;
        overall_pb.inc(1);

        match result {
            Ok(report) => results.push((
                index,
                ProcessResult {
                    path,
                    report: Some(report),
                    error: None,
                    processing_time_ms,
                },
            )),
            Err(e) => {
                let error_msg = e.to_string();
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push((
                        index,
                        ProcessResult {
                            path,
                            report: None,
                            error: Some(error_msg),
                            processing_time_ms,
                        },
                    ));
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    join_set.abort_all();
                    overall_pb.abandon();
                    anyhow::bail!("Processing failed for {}: {}", path.display(), error_msg);
                }
            }
        }
    }

    overall_pb.finish_with_message("Complete");

    results.sort_by_key(|(index, _)| *index);
    let results: Vec<ProcessResult> = results.into_iter().map(|(_, r)| r).collect();

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let stems = unique_stems(results.iter().map(|r| r.path.as_path()));
    let mut written = Vec::with_capacity(results.len());
    for (result, stem) in results.iter().zip(&stems) {
        let Some(report) = &result.report else {
            written.push(None);
            continue;
        };

        let output_path = output_dir.join(output_file_name(
            &config.output.filename_prefix,
            stem,
            &timestamp,
            args.format,
        ));
        fs::write(&output_path, format_report(report, args.format)?)?;
        debug!("Wrote output to {}", output_path.display());
        written.push(Some(output_path));
    }

    if args.summary {
        let summary_path = output_dir.join("summary.csv");
        write_summary(&summary_path, &results, &written)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let successful = results.iter().filter(|r| r.report.is_some()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    let products: usize = results
        .iter()
        .filter_map(|r| r.report.as_ref())
        .map(|r| r.entries.len())
        .sum();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} products",
        style(successful).green(),
        style(failed.len()).red(),
        style(products).cyan()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn process_single_file(
    path: &Path,
    engine: &PriceExtractionEngine,
    categorizer: &KeywordCategorizer,
    output: &OutputConfig,
) -> anyhow::Result<FlyerReport> {
    let extraction = extract_file(engine, path)?;
    Ok(FlyerReport::build(
        extraction,
        categorizer,
        output.min_confidence,
        output.include_rejections,
    ))
}

/// File stems of `paths`; repeats get a `_2`, `_3`, ... suffix so inputs
/// from different directories do not overwrite each other.
fn unique_stems<'p>(paths: impl Iterator<Item = &'p Path>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    paths
        .map(|path| {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("flyer")
                .to_string();
            let count = seen.entry(stem.clone()).or_insert(0);
            *count += 1;
            if *count == 1 { stem } else { format!("{}_{}", stem, count) }
        })
        .collect()
}

/// `<prefix>_<stem>_<YYYYmmdd_HHMMSS>.<ext>`
fn output_file_name(prefix: &str, stem: &str, timestamp: &str, format: OutputFormat) -> String {
    format!("{}_{}_{}.{}", prefix, stem, timestamp, format.extension())
}

fn write_summary(
    path: &Path,
    results: &[ProcessResult],
    written: &[Option<PathBuf>],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "products",
        "below_threshold",
        "rejections",
        "processing_time_ms",
        "output",
        "error",
    ])?;

    for (result, output) in results.iter().zip(written) {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let output = output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        if let Some(report) = &result.report {
            wtr.write_record([
                filename,
                "success",
                &report.entries.len().to_string(),
                &report.below_threshold.to_string(),
                &report.rejections.len().to_string(),
                &result.processing_time_ms.to_string(),
                &output,
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                "",
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        let name = output_file_name("chirashi_result", "store_a", "20240301_093000", OutputFormat::Csv);
        assert_eq!(name, "chirashi_result_store_a_20240301_093000.csv");
    }

    #[test]
    fn test_same_stem_in_different_directories() {
        let paths = [
            Path::new("/flyers/east/store_a.json"),
            Path::new("/flyers/west/store_a.json"),
            Path::new("/flyers/west/store_b.json"),
            Path::new("/flyers/north/store_a.json"),
        ];
        assert_eq!(
            unique_stems(paths.into_iter()),
            vec!["store_a", "store_a_2", "store_b", "store_a_3"]
        );
    }
}
