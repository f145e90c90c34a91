//! The `autograde grade` command.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use autograde_core::error::GradeError;
use autograde_core::grade::Grader;
use autograde_core::model::Document;
use autograde_core::pipeline::{GradingPipeline, ProgressReporter};
use autograde_core::report::GradeReport;
use autograde_providers::config::load_config_from;
use autograde_providers::provider_by_name;

use crate::ReportFormat;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_document_start(&self, source: &str) {
        eprintln!("  Grading: {source}");
    }

    fn on_document_complete(&self, source: &str, report: &GradeReport) {
        eprintln!(
            "  Done: {source} [{}] {:.1}%",
            report.grade.letter, report.grade.percentage
        );
    }

    fn on_document_error(&self, source: &str, error: &str) {
        eprintln!("  ERROR: {source}: {error}");
    }

    fn on_batch_complete(&self, total: usize, graded: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {graded}/{total} graded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    files: Vec<PathBuf>,
    model: Option<String>,
    config_path: Option<PathBuf>,
    parallelism: Option<usize>,
    output: Option<PathBuf>,
    format: ReportFormat,
) -> Result<()> {
    if let Some(p) = parallelism {
        anyhow::ensure!(p >= 1, "parallelism must be at least 1");
    }

    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(p) = parallelism {
        config.parallelism = p;
    }
    let output = output.unwrap_or_else(|| config.output_dir.clone());

    let documents = files
        .iter()
        .map(|path| read_document(path))
        .collect::<Result<Vec<_>>>()?;

    let (provider_name, model_id) = config.resolve_model(model.as_deref());
    let provider = provider_by_name(&config, &provider_name)?;

    let pipeline = GradingPipeline::new(
        Arc::from(provider),
        Grader::new(config.thresholds.clone()),
        config.pipeline_config(&model_id),
    );

    eprintln!(
        "autograde v{} - Grading {} documents with {provider_name}/{model_id}",
        env!("CARGO_PKG_VERSION"),
        documents.len()
    );
    eprintln!();

    let results = pipeline.grade_many(&documents, &ConsoleReporter).await;

    print_summary(&documents, &results);

    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    let stems = report_stems(&documents);
    for ((document, result), stem) in documents.iter().zip(&results).zip(&stems) {
        let Ok(report) = result else {
            continue;
        };

        if matches!(format, ReportFormat::Json | ReportFormat::All) {
            let path = output.join(format!("{stem}-{timestamp}.json"));
            report.save_json(&path)?;
            eprintln!("Report saved to: {}", path.display());
        }
        if matches!(format, ReportFormat::Markdown | ReportFormat::All) {
            let path = output.join(format!("{stem}-{timestamp}.md"));
            std::fs::write(&path, report.to_markdown(&document.source))
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            eprintln!("Markdown report: {}", path.display());
        }
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    anyhow::ensure!(
        failed < results.len(),
        "no documents could be graded ({failed} failed)"
    );

    Ok(())
}

/// File stems for report names. Inputs sharing a stem get their 1-based
/// position appended so no report overwrites another.
fn report_stems(documents: &[Document]) -> Vec<String> {
    let stems: Vec<String> = documents
        .iter()
        .map(|document| {
            Path::new(&document.source)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string())
        })
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    stems
        .iter()
        .enumerate()
        .map(|(index, stem)| {
            if counts[stem.as_str()] > 1 {
                format!("{stem}-{}", index + 1)
            } else {
                stem.clone()
            }
        })
        .collect()
}

/// Read a document as UTF-8 text. Undecodable bytes yield an empty document.
pub(crate) fn read_document(path: &Path) -> Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let text = String::from_utf8(bytes).unwrap_or_else(|_| {
        tracing::warn!("{} is not valid UTF-8; treating it as empty", path.display());
        String::new()
    });
    Ok(Document::new(path.display().to_string(), text))
}

fn print_summary(documents: &[Document], results: &[Result<GradeReport, GradeError>]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Document", "Grade", "Score", "Correct", "Feedback"]);

    for (document, result) in documents.iter().zip(results) {
        let row = match result {
            Ok(report) => {
                let grade = &report.grade;
                let correct = match (grade.correct, grade.total) {
                    (Some(c), Some(t)) => format!("{c}/{t}"),
                    _ => "-".to_string(),
                };
                let feedback = report.error().unwrap_or(&grade.feedback).to_string();
                vec![
                    Cell::new(&document.source),
                    Cell::new(grade.letter),
                    Cell::new(format!("{:.1}%", grade.percentage)),
                    Cell::new(correct),
                    Cell::new(feedback),
                ]
            }
            Err(e) => vec![
                Cell::new(&document.source),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(e),
            ],
        };
        table.add_row(row);
    }

    eprintln!("\n{table}");
}
