//! Grading pipeline orchestrator.
//!
//! Runs extraction, evaluation, verdict merging and grading for one document,
//! or for many documents concurrently, with retries on transient provider
//! errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{GradeError, ProviderError};
use crate::evaluate::{build_evaluation_prompt, merge_verdicts, parse_verdicts};
use crate::extract::Extractor;
use crate::grade::Grader;
use crate::model::{AnalysisEntry, Document, QaRecord, Verdict};
use crate::report::GradeReport;
use crate::traits::{GenerateRequest, GenerateResponse, LlmProvider};

/// Upper bound on any wait between evaluator attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the grading pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Evaluator model identifier.
    pub model: String,
    /// Temperature for evaluation.
    pub temperature: f64,
    /// Max tokens for the evaluator response.
    pub max_tokens: u32,
    /// Retries on transient provider errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_delay: Duration,
    /// Optional system prompt override.
    pub system_prompt_override: Option<String>,
    /// Maximum documents graded at once.
    pub parallelism: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.0,
            max_tokens: 8192,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            system_prompt_override: None,
            parallelism: 4,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_document_start(&self, source: &str);
    fn on_document_complete(&self, source: &str, report: &GradeReport);
    fn on_document_error(&self, source: &str, error: &str);
    fn on_batch_complete(&self, total: usize, graded: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_document_start(&self, _: &str) {}
    fn on_document_complete(&self, _: &str, _: &GradeReport) {}
    fn on_document_error(&self, _: &str, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Extract → evaluate → merge → grade.
pub struct GradingPipeline {
    extractor: Extractor,
    grader: Grader,
    provider: Arc<dyn LlmProvider>,
    config: PipelineConfig,
}

impl GradingPipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, grader: Grader, config: PipelineConfig) -> Self {
        Self {
            extractor: Extractor::default(),
            grader,
            provider,
            config,
        }
    }

    /// Replace the default extraction cascade.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Grade one document.
    ///
    /// Fails only when no question-answer pairs are found, before the
    /// evaluator is called. Evaluator failures are folded into the report as
    /// a single error entry with the degraded grade.
    pub async fn grade_document(&self, document: &Document) -> Result<GradeReport, GradeError> {
        let span = tracing::info_span!("grade", run_id = %Uuid::new_v4(), source = %document.source);

        async {
            let extraction = self.extractor.extract(&document.text);
            if extraction.is_empty() {
                return Err(GradeError::NoPairsFound);
            }

            let analysis = self.analyze(&extraction.records).await;
            let grade = self.grader.grade(&analysis);
            tracing::info!(
                "{}: grade {} ({:.1}%)",
                document.source,
                grade.letter,
                grade.percentage
            );

            Ok(GradeReport { grade, analysis })
        }
        .instrument(span)
        .await
    }

    /// Grade several documents concurrently, at most `parallelism` at a time.
    ///
    /// Results are returned in the same order as `documents`.
    pub async fn grade_many(
        &self,
        documents: &[Document],
        progress: &dyn ProgressReporter,
    ) -> Vec<Result<GradeReport, GradeError>> {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut futures = FuturesUnordered::new();

        for (index, document) in documents.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                progress.on_document_start(&document.source);
                (index, self.grade_document(document).await)
            });
        }

        let mut slots: Vec<Option<Result<GradeReport, GradeError>>> =
            (0..documents.len()).map(|_| None).collect();
        let mut graded = 0usize;
        let mut failed = 0usize;

        while let Some((index, result)) = futures.next().await {
            let source = &documents[index].source;
            match &result {
                Ok(report) => {
                    progress.on_document_complete(source, report);
                    graded += 1;
                }
                Err(e) => {
                    tracing::error!("grading failed for {source}: {e}");
                    progress.on_document_error(source, &e.to_string());
                    failed += 1;
                }
            }
            slots[index] = Some(result);
        }

        progress.on_batch_complete(documents.len(), graded, failed, start.elapsed());

        slots.into_iter().flatten().collect()
    }

    /// Ask the evaluator about every record. Never fails: an unusable
    /// evaluator yields a single error entry.
    pub async fn analyze(&self, records: &[QaRecord]) -> Vec<AnalysisEntry> {
        match self.evaluate(records).await {
            Ok(verdicts) => verdicts.into_iter().map(AnalysisEntry::from).collect(),
            Err(e) => {
                tracing::error!("batch analysis failed: {e:#}");
                vec![AnalysisEntry::error(format!("Batch analysis failed: {e}"))]
            }
        }
    }

    async fn evaluate(&self, records: &[QaRecord]) -> Result<Vec<Verdict>> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_evaluation_prompt(records),
            system_prompt: self.config.system_prompt_override.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self.generate_with_retry(&request).await?;
        tracing::debug!(
            latency_ms = response.latency_ms,
            tokens = response.token_usage.total_tokens,
            "raw evaluator response: {}",
            response.content.chars().take(1000).collect::<String>()
        );

        let raw = parse_verdicts(&response.content)?;
        Ok(merge_verdicts(records, raw))
    }

    async fn generate_with_retry(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        // Retry on transient provider errors with exponential backoff
        let mut last_error = None;
        let mut retry_delay = self.config.retry_delay;
        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tokio::time::sleep(retry_delay).await;
                retry_delay = retry_delay.saturating_mul(2).min(MAX_RETRY_DELAY);
            }
            match self.provider.generate(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if let Some(provider_error) = e.downcast_ref::<ProviderError>() {
                        if provider_error.is_permanent() {
                            return Err(e);
                        }
                        // Use provider's retry-after hint if available
                        if let Some(ms) = provider_error.retry_after_ms() {
                            retry_delay = Duration::from_millis(ms).min(MAX_RETRY_DELAY);
                        }
                    }
                    tracing::warn!(
                        "{} request failed (attempt {}): {e:#}",
                        self.provider.name(),
                        retry + 1
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error")))
    }
}
