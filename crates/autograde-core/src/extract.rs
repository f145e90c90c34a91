//! Question-answer extraction from loosely formatted document text.
//!
//! Extraction is a cascade of independent strategies, tried from the most
//! structured to the most forgiving. The first strategy that finds anything
//! supplies the whole result, so a weaker strategy never adds duplicates of
//! pairs a stronger one already found.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::QaRecord;

/// `Q1`, `q 12`, `Question 3`. Only at a word boundary, so `FAQ 3` is not a label.
static QUESTION_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:question|q)\s*(\d+)").expect("valid regex"));

/// A line break followed by `A1` / `Answer 1`; the number is checked by the caller.
static NUMBERED_ANSWER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\r\n|\n|\r)[ \t]*(?:answer|a)\s*(\d+)").expect("valid regex")
});

/// `1.`, `2)`, `3:` at the start of a line.
static LIST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mR)^[ \t]*(\d+)[.:)]").expect("valid regex"));

/// A line break followed by `A.` / `Answer:` / `Ans)` or the bare word and whitespace.
static LIST_ANSWER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\r\n|\n|\r)[ \t]*(?:answer|ans|a)[.:)\s]").expect("valid regex")
});

static QUESTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:question|q)?\s*(\d+)[.:)\s]+(.+)$").expect("valid regex")
});

static ANSWER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:answer|ans|a)[.:)\s]+(.+)$").expect("valid regex"));

/// One way of finding question-answer pairs in text.
///
/// Implementations are pure: the same text always yields the same records, in
/// the order the questions appear.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs (e.g. "labeled-pairs").
    fn name(&self) -> &'static str;

    /// Find every pair this strategy recognizes. Empty means "not my format".
    fn extract(&self, text: &str) -> Vec<QaRecord>;
}

/// `Q1: ... \n A1: ...` blocks, where the answer label repeats the question number.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabeledPairs;

impl ExtractionStrategy for LabeledPairs {
    fn name(&self) -> &'static str {
        "labeled-pairs"
    }

    /// The question runs up to the first answer label carrying its number, so
    /// it may mention other labels ("see Question 2"). Only the answer stops at
    /// the next question label. Scanning resumes after each answer.
    fn extract(&self, text: &str) -> Vec<QaRecord> {
        let mut records = Vec::new();
        let mut pos = 0;

        while let Some(caps) = QUESTION_LABEL.captures_at(text, pos) {
            let (Some(label), Some(num)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let num = num.as_str();

            let answer_label = NUMBERED_ANSWER_LABEL
                .captures_iter(&text[label.end()..])
                .filter_map(|caps| Some((caps.get(0)?, caps.get(1)?)))
                .find(|(_, n)| n.as_str() == num)
                .map(|(whole, _)| (label.end() + whole.start(), label.end() + whole.end()));

            let Some((answer_label_start, answer_start)) = answer_label else {
                tracing::trace!("question {num} has no matching answer label");
                pos = label.end();
                continue;
            };

            let answer_end = QUESTION_LABEL
                .find_at(text, answer_start)
                .map_or(text.len(), |next| next.start());

            records.push(QaRecord::new(
                num,
                strip_separators(&text[label.end()..answer_label_start]),
                strip_separators(&text[answer_start..answer_end]),
            ));
            pos = answer_end;
        }

        records
    }
}

/// `1. ... \n Answer: ...` blocks with no `Q` prefix on the question.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberedList;

impl ExtractionStrategy for NumberedList {
    fn name(&self) -> &'static str {
        "numbered-list"
    }

    fn extract(&self, text: &str) -> Vec<QaRecord> {
        label_blocks(text, &LIST_NUMBER)
            .into_iter()
            .filter_map(|block| {
                let label = LIST_ANSWER_LABEL.find(block.body)?;
                Some(QaRecord::new(
                    block.num,
                    strip_separators(&block.body[..label.start()]),
                    strip_separators(&block.body[label.end()..]),
                ))
            })
            .collect()
    }
}

/// Line-by-line pairing of a numbered question line with the next answer line.
///
/// A question line that is never answered is dropped when the next question
/// line arrives, and an answer line with no open question is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineScan;

impl ExtractionStrategy for LineScan {
    fn name(&self) -> &'static str {
        "line-scan"
    }

    fn extract(&self, text: &str) -> Vec<QaRecord> {
        let mut records = Vec::new();
        let mut pending: Option<(&str, &str)> = None;

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if index < 10 {
                tracing::trace!(index, line, "scanning line");
            }

            if let Some(caps) = QUESTION_LINE.captures(line) {
                if let (Some(num), Some(question)) = (caps.get(1), caps.get(2)) {
                    if let Some((dropped, _)) = pending {
                        tracing::debug!("question {dropped} has no answer line, dropping it");
                    }
                    pending = Some((num.as_str(), question.as_str()));
                    continue;
                }
            }

            let Some((num, question)) = pending else {
                continue;
            };
            if let Some(answer) = ANSWER_LINE.captures(line).and_then(|caps| caps.get(1)) {
                records.push(QaRecord::new(num, question, answer.as_str()));
                pending = None;
            }
        }

        records
    }
}

/// The result of running the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Records in order of appearance.
    pub records: Vec<QaRecord>,
    /// The strategy that produced them, or `None` when nothing matched.
    pub strategy: Option<&'static str>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Ordered list of strategies, tried until one finds at least one pair.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies, in priority order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, text: &str) -> Extraction {
        tracing::debug!(
            chars = text.len(),
            preview = %text.chars().take(500).collect::<String>(),
            "extracting question-answer pairs"
        );

        for strategy in &self.strategies {
            let records = strategy.extract(text);
            tracing::debug!("{} found {} pairs", strategy.name(), records.len());
            if records.is_empty() {
                continue;
            }

            for record in &records {
                tracing::debug!(
                    "Q{}: {} / A: {}",
                    record.question_num,
                    preview(&record.question),
                    preview(&record.answer)
                );
            }
            tracing::info!(
                "extracted {} question-answer pairs with {}",
                records.len(),
                strategy.name()
            );
            return Extraction {
                records,
                strategy: Some(strategy.name()),
            };
        }

        tracing::info!("no question-answer pairs found");
        Extraction {
            records: Vec::new(),
            strategy: None,
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(LabeledPairs),
            Box::new(NumberedList),
            Box::new(LineScan),
        ])
    }
}

/// Run the default cascade and return only the records.
pub fn extract_qa_pairs(text: &str) -> Vec<QaRecord> {
    Extractor::default().extract(text).records
}

/// Text following a numbering label, up to the next label or end of text.
struct LabelBlock<'t> {
    num: &'t str,
    body: &'t str,
}

fn label_blocks<'t>(text: &'t str, label: &Regex) -> Vec<LabelBlock<'t>> {
    let labels: Vec<(usize, usize, &str)> = label
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let num = caps.get(1)?;
            Some((whole.start(), whole.end(), num.as_str()))
        })
        .collect();

    labels
        .iter()
        .enumerate()
        .map(|(i, &(_, body_start, num))| {
            let end = labels.get(i + 1).map_or(text.len(), |next| next.0);
            LabelBlock {
                num,
                body: &text[body_start..end],
            }
        })
        .collect()
}

fn strip_separators(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '.' | ')'))
}

fn preview(s: &str) -> String {
    s.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(records: &[QaRecord]) -> Vec<&str> {
        records.iter().map(|r| r.question_num.as_str()).collect()
    }

    #[test]
    fn labeled_pairs_in_order() {
        let text = "Q1: What is Rust?\nA1: A systems language.\nQ2: What is Cargo?\nA2: The build tool.";
        let extraction = Extractor::default().extract(text);

        assert_eq!(extraction.strategy, Some("labeled-pairs"));
        assert_eq!(
            extraction.records,
            vec![
                QaRecord::new("1", "What is Rust?", "A systems language."),
                QaRecord::new("2", "What is Cargo?", "The build tool."),
            ]
        );
    }

    #[test]
    fn labeled_answer_does_not_swallow_next_label() {
        let text = "Question 1. Name a prime.\nAnswer 1) Seven\n\nQuestion 2: Name an even number\nAnswer 2: Four";
        let records = LabeledPairs.extract(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].answer, "Seven");
        assert!(!records[0].answer.contains("Question"));
        assert_eq!(records[1].question, "Name an even number");
        assert_eq!(records[1].answer, "Four");
    }

    #[test]
    fn labeled_pairs_are_case_insensitive_and_multiline() {
        let text = "q1 explain ownership\na1: Each value has one owner.\n  It is dropped when the owner goes out of scope.\nq2) borrowing?\na2 References.\r\n";
        let records = LabeledPairs.extract(text);
        assert_eq!(nums(&records), vec!["1", "2"]);
        assert_eq!(
            records[0].answer,
            "Each value has one owner.\n  It is dropped when the owner goes out of scope."
        );
        assert_eq!(records[1].question, "borrowing?");
        assert_eq!(records[1].answer, "References.");
    }

    #[test]
    fn labeled_answer_number_must_match() {
        let text = "Q1: First?\nA2: Wrong number.\nQ3: Third?\nA3: Right.";
        let records = LabeledPairs.extract(text);
        assert_eq!(nums(&records), vec!["3"]);
    }

    #[test]
    fn labeled_question_may_mention_other_labels() {
        let text = "Q1: Using the result of Question 2, explain X.\nA1: Because Y.\nQ2: What is Z?\nA2: W.";
        let extraction = Extractor::default().extract(text);
        assert_eq!(extraction.strategy, Some("labeled-pairs"));
        assert_eq!(
            extraction.records,
            vec![
                QaRecord::new("1", "Using the result of Question 2, explain X.", "Because Y."),
                QaRecord::new("2", "What is Z?", "W."),
            ]
        );

        let records = LabeledPairs.extract("Q1: What is the value of q2 in the equation?\nA1: 5");
        assert_eq!(
            records,
            vec![QaRecord::new("1", "What is the value of q2 in the equation?", "5")]
        );
    }

    #[test]
    fn labeled_keeps_literal_numbering() {
        let text = "Q07: Padded?\nA07: Yes.\nQ3: Out of order?\nA3: Also yes.";
        let records = LabeledPairs.extract(text);
        assert_eq!(nums(&records), vec!["07", "3"]);
    }

    #[test]
    fn numbered_list_fires_without_q_labels() {
        let text = "1. What is X?\nAnswer: Y.\n2. What is Z?\nAns: W.";
        let extraction = Extractor::default().extract(text);

        assert_eq!(extraction.strategy, Some("numbered-list"));
        assert_eq!(nums(&extraction.records), vec!["1", "2"]);
        assert_eq!(extraction.records[0].question, "What is X?");
        assert_eq!(extraction.records[0].answer, "Y.");
        assert_eq!(extraction.records[1].answer, "W.");
    }

    #[test]
    fn numbered_list_multiline_answer_ends_at_next_number() {
        let text = "1) Define pi\nA: Roughly 3.14, the ratio\nof circumference to diameter.\n2) Define e\nA. About 2.718";
        let records = NumberedList.extract(text);
        assert_eq!(nums(&records), vec!["1", "2"]);
        assert_eq!(
            records[0].answer,
            "Roughly 3.14, the ratio\nof circumference to diameter."
        );
        assert_eq!(records[1].answer, "About 2.718");
    }

    #[test]
    fn numbered_list_ignores_words_starting_with_a() {
        let text = "1. Name a fruit\nAn apple a day.\n2. Name a colour\nAnswer: Red";
        let records = NumberedList.extract(text);
        assert_eq!(nums(&records), vec!["2"]);
    }

    #[test]
    fn line_scan_pairs_question_with_next_answer() {
        let text = "Quiz\n\nQuestion 4 - what is 2+2?\nsome noise\nA) four\nA) stray second answer";
        let records = LineScan.extract(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question_num, "4");
        assert_eq!(records[0].question, "- what is 2+2?");
        assert_eq!(records[0].answer, "four");
    }

    #[test]
    fn line_scan_replaces_unanswered_question() {
        let text = "5 First question\n6 Second question\nAns: only this one";
        let records = LineScan.extract(text);
        assert_eq!(records, vec![QaRecord::new("6", "Second question", "only this one")]);
    }

    #[test]
    fn fallback_reaches_line_scan() {
        // The answer label carries no number, so only the line scan pairs it.
        let text = "Q 1 What colour is the sky\n\n   Answer - blue";
        let extraction = Extractor::default().extract(text);
        assert_eq!(extraction.strategy, Some("line-scan"));
        assert_eq!(extraction.records[0].answer, "- blue");
    }

    #[test]
    fn stray_answers_yield_nothing() {
        let text = "Some intro paragraph.\nAnswer: floating answer\nAns: another one\nThe end.";
        let extraction = Extractor::default().extract(text);
        assert!(extraction.is_empty());
        assert_eq!(extraction.strategy, None);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract_qa_pairs("").is_empty());
        assert!(extract_qa_pairs("   \n\n\t").is_empty());
    }

    #[test]
    fn stronger_strategy_wins_without_duplicates() {
        // Line scan would also find these; only the labeled result is returned.
        let text = "Q1: One?\nA1: Yes.\n1. Loose?\nAnswer: Maybe.";
        let extraction = Extractor::default().extract(text);
        assert_eq!(extraction.strategy, Some("labeled-pairs"));
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn custom_strategy_list() {
        let extractor = Extractor::new(vec![Box::new(LineScan)]);
        assert_eq!(extractor.strategy_names(), vec!["line-scan"]);
        let records = extractor.extract("Q1: One?\nA1: Yes.").records;
        // "A1: Yes." is not an answer line shape, so nothing pairs.
        assert!(records.is_empty());
    }
}
