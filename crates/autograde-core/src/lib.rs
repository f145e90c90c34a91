//! Question-answer extraction and grade aggregation.
//!
//! This crate defines the data model, the extraction cascade, the grader, the
//! evaluator trait and the pipeline that composes them. Everything except the
//! pipeline is synchronous and free of I/O.

pub mod error;
pub mod evaluate;
pub mod extract;
pub mod grade;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod traits;

pub use error::{GradeError, ProviderError, ThresholdError};
pub use extract::{extract_qa_pairs, Extraction, ExtractionStrategy, Extractor};
pub use grade::{assign_grade, Grader};
pub use model::{AnalysisEntry, Document, GradeLetter, GradeResult, GradeThresholds, QaRecord, Verdict};
pub use pipeline::{GradingPipeline, PipelineConfig, ProgressReporter};
pub use report::GradeReport;
