//! Grade report type with JSON persistence and a markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{AnalysisEntry, GradeResult};

/// The final payload for one document: the grade and the analysis behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub grade: GradeResult,
    pub analysis: Vec<AnalysisEntry>,
}

impl GradeReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradeReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// The evaluator error that replaced the analysis, if any.
    pub fn error(&self) -> Option<&str> {
        match self.analysis.first() {
            Some(AnalysisEntry::Error { error }) => Some(error),
            _ => None,
        }
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self, source: &str) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Grade for {source}\n\n"));
        md.push_str(&format!("**Grade:** {}", self.grade.letter));
        if let (Some(correct), Some(total)) = (self.grade.correct, self.grade.total) {
            md.push_str(&format!(
                " ({:.1}%, {correct}/{total} correct)",
                self.grade.percentage
            ));
        }
        md.push_str(&format!("\n\n{}\n\n", self.grade.feedback));

        if let Some(error) = self.error() {
            md.push_str(&format!("> {error}\n"));
            return md;
        }

        for entry in &self.analysis {
            let AnalysisEntry::Verdict(v) = entry else {
                continue;
            };
            let mark = if v.is_correct { "correct" } else { "incorrect" };
            md.push_str(&format!("## Q{}: {} ({mark})\n\n", v.question_num, v.question));
            md.push_str(&format!("**Answer:** {}\n\n", v.answer));
            if !v.is_correct && !v.correct_answer.is_empty() {
                md.push_str(&format!("**Expected:** {}\n\n", v.correct_answer));
            }
            if !v.explanation.is_empty() {
                md.push_str(&format!("{}\n\n", v.explanation));
            }
            if !v.suggestion.is_empty() {
                md.push_str(&format!("_Suggestion:_ {}\n\n", v.suggestion));
            }
        }

        md
    }
}

/// Load an analysis from JSON: either a full report or a bare array of entries.
pub fn load_analysis(path: &Path) -> Result<Vec<AnalysisEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read analysis from {}", path.display()))?;
    if let Ok(report) = serde_json::from_str::<GradeReport>(&content) {
        return Ok(report.analysis);
    }
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse analysis JSON: {}", path.display()))
}
