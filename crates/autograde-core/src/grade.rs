//! Grade aggregation over evaluator verdicts.
//!
//! The grader is a pure reduction: it never fails, and anything it cannot
//! score becomes the degraded `N/A` result.

use crate::model::{AnalysisEntry, GradeLetter, GradeResult, GradeThresholds};

/// Feedback for analyses that could not be scored.
pub const DEGRADED_FEEDBACK: &str = "Unable to grade due to document parsing issues.";

const EXCELLENT: &str =
    "Excellent work! You've demonstrated a thorough understanding of the material.";
const GOOD: &str =
    "Good job! You have a solid grasp of most concepts, with some room for improvement.";
const SATISFACTORY: &str =
    "Satisfactory work. You understand the basics but should review some key concepts.";
const NEEDS_IMPROVEMENT: &str =
    "You need improvement. Please review the material and focus on the areas where you made mistakes.";
const FAILING: &str =
    "Significant improvement needed. Please review all the material carefully and consider seeking additional help.";

const FEEDBACK_BANDS: [(f64, &str); 4] = [
    (90.0, EXCELLENT),
    (80.0, GOOD),
    (70.0, SATISFACTORY),
    (60.0, NEEDS_IMPROVEMENT),
];

/// Reduces an analysis to a letter grade with feedback.
#[derive(Debug, Clone, Default)]
pub struct Grader {
    thresholds: GradeThresholds,
}

impl Grader {
    pub fn new(thresholds: GradeThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GradeThresholds {
        &self.thresholds
    }

    /// Grade an analysis.
    ///
    /// An empty analysis, or one whose first entry is an evaluator error,
    /// yields the degraded result. Otherwise every entry counts toward the
    /// total and verdicts marked correct count toward the score.
    pub fn grade(&self, analysis: &[AnalysisEntry]) -> GradeResult {
        match analysis.first() {
            None => {
                tracing::debug!("nothing to grade");
                return degraded();
            }
            Some(AnalysisEntry::Error { error }) => {
                tracing::debug!("analysis carries an evaluator error: {error}");
                return degraded();
            }
            Some(AnalysisEntry::Verdict(_)) => {}
        }

        let total = analysis.len();
        let correct = analysis.iter().filter(|entry| entry.is_correct()).count();
        let percentage = round_to_tenth(100.0 * correct as f64 / total as f64);

        let letter = self.thresholds.letter_for(percentage);
        let feedback = self.feedback_for(percentage);

        tracing::debug!("graded {correct}/{total} ({percentage}%) as {letter}");

        GradeResult {
            letter,
            percentage,
            feedback: feedback.to_string(),
            correct: Some(correct),
            total: Some(total),
        }
    }

    /// Feedback for a percentage, banded at fixed 90/80/70/60 boundaries.
    ///
    /// The bands do not follow custom thresholds, so a letter and its
    /// feedback can disagree when the thresholds are moved.
    pub fn feedback_for(&self, percentage: f64) -> &'static str {
        FEEDBACK_BANDS
            .iter()
            .find(|(minimum, _)| percentage >= *minimum)
            .map_or(FAILING, |(_, feedback)| *feedback)
    }
}

/// Grade with the default thresholds.
pub fn assign_grade(analysis: &[AnalysisEntry]) -> GradeResult {
    Grader::default().grade(analysis)
}

/// The result for analyses that cannot be scored.
pub fn degraded() -> GradeResult {
    GradeResult {
        letter: GradeLetter::NotApplicable,
        percentage: 0.0,
        feedback: DEGRADED_FEEDBACK.to_string(),
        correct: None,
        total: None,
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
