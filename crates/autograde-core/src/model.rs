//! Core data model types for autograde.
//!
//! These are the fundamental types the whole pipeline passes around:
//! extracted question-answer records, evaluator verdicts, grade bands and
//! the final grade.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;

/// A single document's decoded plain text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name or other label used in logs and report names.
    pub source: String,
    /// Full decoded text.
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// One question paired with its answer, as found in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    /// The literal digit run that numbered the question. Only ever used as a
    /// join key, never parsed.
    pub question_num: String,
    pub question: String,
    pub answer: String,
}

impl QaRecord {
    /// Build a record, trimming the outer whitespace of question and answer.
    pub fn new(question_num: impl Into<String>, question: &str, answer: &str) -> Self {
        Self {
            question_num: question_num.into(),
            question: question.trim().to_string(),
            answer: answer.trim().to_string(),
        }
    }
}

/// An evaluator's judgment of one question-answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub question_num: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggestion: String,
}

/// One element of an analysis: a verdict, or the error that replaced the
/// whole analysis when the evaluator could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisEntry {
    Error { error: String },
    Verdict(Verdict),
}

impl AnalysisEntry {
    pub fn error(message: impl Into<String>) -> Self {
        AnalysisEntry::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisEntry::Error { .. })
    }

    pub fn is_correct(&self) -> bool {
        match self {
            AnalysisEntry::Verdict(v) => v.is_correct,
            AnalysisEntry::Error { .. } => false,
        }
    }
}

impl From<Verdict> for AnalysisEntry {
    fn from(verdict: Verdict) -> Self {
        AnalysisEntry::Verdict(verdict)
    }
}

/// Letter grades, including the degraded `N/A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GradeLetter {
    A,
    B,
    C,
    D,
    F,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl fmt::Display for GradeLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeLetter::A => write!(f, "A"),
            GradeLetter::B => write!(f, "B"),
            GradeLetter::C => write!(f, "C"),
            GradeLetter::D => write!(f, "D"),
            GradeLetter::F => write!(f, "F"),
            GradeLetter::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl FromStr for GradeLetter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(GradeLetter::A),
            "B" => Ok(GradeLetter::B),
            "C" => Ok(GradeLetter::C),
            "D" => Ok(GradeLetter::D),
            "F" => Ok(GradeLetter::F),
            "N/A" | "NA" => Ok(GradeLetter::NotApplicable),
            other => Err(format!("unknown grade letter: {other}")),
        }
    }
}

/// The aggregate grade for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub letter: GradeLetter,
    /// Percent correct, rounded to one decimal place.
    pub percentage: f64,
    pub feedback: String,
    /// Absent on the degraded `N/A` result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl GradeResult {
    pub fn is_degraded(&self) -> bool {
        self.letter == GradeLetter::NotApplicable
    }
}

/// Letter bands keyed by minimum percentage, kept sorted from the highest
/// minimum to the lowest.
///
/// Construction guarantees the bands cover `[0, 100]`: every minimum lies in
/// that range, minimums are distinct, and the lowest band starts at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<GradeLetter, f64>",
    into = "BTreeMap<GradeLetter, f64>"
)]
pub struct GradeThresholds {
    bands: Vec<(GradeLetter, f64)>,
}

impl GradeThresholds {
    pub fn new(bands: impl IntoIterator<Item = (GradeLetter, f64)>) -> Result<Self, ThresholdError> {
        let mut bands: Vec<(GradeLetter, f64)> = bands.into_iter().collect();

        for &(letter, minimum) in &bands {
            if letter == GradeLetter::NotApplicable {
                return Err(ThresholdError::ReservedLetter);
            }
            if !(0.0..=100.0).contains(&minimum) {
                return Err(ThresholdError::OutOfRange { letter, minimum });
            }
        }

        bands.sort_by(|a, b| b.1.total_cmp(&a.1));

        if let Some(pair) = bands.windows(2).find(|pair| pair[0].1 == pair[1].1) {
            return Err(ThresholdError::DuplicateMinimum(pair[1].1));
        }

        let mut seen = HashSet::new();
        if let Some(&(letter, _)) = bands.iter().find(|(letter, _)| !seen.insert(*letter)) {
            return Err(ThresholdError::DuplicateLetter(letter));
        }

        match bands.last() {
            Some(&(_, lowest)) if lowest == 0.0 => Ok(Self { bands }),
            Some(&(_, lowest)) => Err(ThresholdError::Uncovered(lowest)),
            None => Err(ThresholdError::Empty),
        }
    }

    /// Bands from the highest minimum to the lowest.
    pub fn bands(&self) -> &[(GradeLetter, f64)] {
        &self.bands
    }

    /// The first band, walking down from the top, whose minimum is met.
    pub fn letter_for(&self, percentage: f64) -> GradeLetter {
        self.bands
            .iter()
            .find(|(_, minimum)| percentage >= *minimum)
            .map(|(letter, _)| *letter)
            .unwrap_or(GradeLetter::NotApplicable)
    }
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            bands: vec![
                (GradeLetter::A, 90.0),
                (GradeLetter::B, 80.0),
                (GradeLetter::C, 70.0),
                (GradeLetter::D, 60.0),
                (GradeLetter::F, 0.0),
            ],
        }
    }
}

impl TryFrom<BTreeMap<GradeLetter, f64>> for GradeThresholds {
    type Error = ThresholdError;

    fn try_from(map: BTreeMap<GradeLetter, f64>) -> Result<Self, Self::Error> {
        GradeThresholds::new(map)
    }
}

impl From<GradeThresholds> for BTreeMap<GradeLetter, f64> {
    fn from(thresholds: GradeThresholds) -> Self {
        thresholds.bands.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_trims_outer_whitespace_only() {
        let record = QaRecord::new("3", "  What is X?\n", "\n line one\n line two  ");
        assert_eq!(record.question, "What is X?");
        assert_eq!(record.answer, "line one\n line two");
        assert_eq!(record.question_num, "3");
    }

    #[test]
    fn grade_letter_display_and_parse() {
        assert_eq!(GradeLetter::NotApplicable.to_string(), "N/A");
        assert_eq!("b".parse::<GradeLetter>().unwrap(), GradeLetter::B);
        assert_eq!(
            "n/a".parse::<GradeLetter>().unwrap(),
            GradeLetter::NotApplicable
        );
        assert!("E".parse::<GradeLetter>().is_err());
    }

    #[test]
    fn default_thresholds_are_descending() {
        let thresholds = GradeThresholds::default();
        let minimums: Vec<f64> = thresholds.bands().iter().map(|b| b.1).collect();
        assert_eq!(minimums, vec![90.0, 80.0, 70.0, 60.0, 0.0]);
    }

    #[test]
    fn thresholds_sort_unordered_input() {
        let thresholds = GradeThresholds::new([
            (GradeLetter::F, 0.0),
            (GradeLetter::A, 85.0),
            (GradeLetter::C, 50.0),
        ])
        .unwrap();
        assert_eq!(thresholds.letter_for(85.0), GradeLetter::A);
        assert_eq!(thresholds.letter_for(84.9), GradeLetter::C);
        assert_eq!(thresholds.letter_for(0.0), GradeLetter::F);
    }

    #[test]
    fn thresholds_must_reach_zero() {
        let err = GradeThresholds::new([(GradeLetter::A, 90.0), (GradeLetter::F, 10.0)])
            .unwrap_err();
        assert!(matches!(err, ThresholdError::Uncovered(_)));
    }

    #[test]
    fn thresholds_reject_bad_input() {
        assert!(matches!(
            GradeThresholds::new([(GradeLetter::A, 120.0), (GradeLetter::F, 0.0)]),
            Err(ThresholdError::OutOfRange { .. })
        ));
        assert!(matches!(
            GradeThresholds::new([(GradeLetter::NotApplicable, 0.0)]),
            Err(ThresholdError::ReservedLetter)
        ));
        assert!(matches!(
            GradeThresholds::new([(GradeLetter::A, 50.0), (GradeLetter::B, 50.0), (GradeLetter::F, 0.0)]),
            Err(ThresholdError::DuplicateMinimum(_))
        ));
        assert!(matches!(
            GradeThresholds::new(Vec::new()),
            Err(ThresholdError::Empty)
        ));
    }

    #[test]
    fn thresholds_deserialize_from_map() {
        let json = r#"{"A": 95, "B": 85, "C": 75, "D": 65, "F": 0}"#;
        let thresholds: GradeThresholds = serde_json::from_str(json).unwrap();
        assert_eq!(thresholds.letter_for(94.9), GradeLetter::B);

        let bad = r#"{"A": 95, "B": 85}"#;
        assert!(serde_json::from_str::<GradeThresholds>(bad).is_err());
    }

    #[test]
    fn analysis_entry_untagged_shapes() {
        let error: AnalysisEntry =
            serde_json::from_str(r#"{"error": "Batch analysis failed: timeout"}"#).unwrap();
        assert!(error.is_error());

        let verdict: AnalysisEntry =
            serde_json::from_str(r#"{"question_num": "1", "is_correct": true}"#).unwrap();
        assert!(!verdict.is_error());
        assert!(verdict.is_correct());
    }

    #[test]
    fn degraded_grade_omits_counts() {
        let grade = GradeResult {
            letter: GradeLetter::NotApplicable,
            percentage: 0.0,
            feedback: "x".into(),
            correct: None,
            total: None,
        };
        let json = serde_json::to_value(&grade).unwrap();
        assert_eq!(json["letter"], "N/A");
        assert!(json.get("correct").is_none());
        assert!(json.get("total").is_none());
    }
}
