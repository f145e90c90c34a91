//! The boundary with the external evaluator: prompt construction, response
//! parsing and the key-based merge of verdicts back onto extracted records.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::model::{QaRecord, Verdict};

/// One verdict object as the evaluator returned it, before defaults are applied.
pub type RawVerdict = Map<String, Value>;

const PROMPT_HEADER: &str = r#"You are an expert evaluator. Analyze the following Q&A pairs and return a valid JSON array. Format for each:

[
  {
    "question_num": "1",
    "question": "What is Python?",
    "answer": "Python is a programming language.",
    "is_correct": true,
    "correct_answer": "Python is a high-level programming language.",
    "explanation": "The answer is correct but can be more detailed.",
    "suggestion": "Mention that it's high-level and widely used for scripting, web dev, etc."
  }
]

Now analyze:
"#;

/// Build the batched prompt listing every extracted pair.
pub fn build_evaluation_prompt(records: &[QaRecord]) -> String {
    let mut prompt = String::from(PROMPT_HEADER);
    for record in records {
        prompt.push_str(&format!("Q{}: {}\n", record.question_num, record.question));
        prompt.push_str(&format!("A{}: {}\n\n", record.question_num, record.answer));
    }
    prompt
}

/// Find the first non-empty JSON array of objects in an evaluator response.
///
/// Handles:
/// - A bare array
/// - An array inside a ```json fenced block
/// - Prose before and after the array
pub fn parse_verdicts(response: &str) -> Result<Vec<RawVerdict>> {
    for (start, _) in response.match_indices('[') {
        let mut stream =
            serde_json::Deserializer::from_str(&response[start..]).into_iter::<Vec<RawVerdict>>();
        if let Some(Ok(items)) = stream.next() {
            if !items.is_empty() {
                return Ok(items);
            }
        }
    }
    anyhow::bail!("No valid JSON array found in evaluator response.")
}

/// Join evaluator verdicts back onto the extracted records by question number.
///
/// Verdicts whose number matches no record are dropped, and a record takes at
/// most one verdict. Missing fields default to `false` / empty, and `answer`
/// always carries the originally extracted answer. Output follows record order.
pub fn merge_verdicts(records: &[QaRecord], raw: Vec<RawVerdict>) -> Vec<Verdict> {
    let keys: Vec<String> = records
        .iter()
        .map(|r| question_key(&r.question_num))
        .collect();
    let mut slots: Vec<Option<Verdict>> = vec![None; records.len()];

    for item in raw {
        let Some(key) = item.get("question_num").and_then(value_key) else {
            tracing::warn!("dropping verdict without a question_num");
            continue;
        };

        let open = (0..records.len()).find(|&i| keys[i] == key && slots[i].is_none());
        let Some(index) = open else {
            if keys.contains(&key) {
                tracing::warn!("dropping duplicate verdict for question {key}");
            } else {
                tracing::warn!("dropping verdict for unknown question {key}");
            }
            continue;
        };

        let record = &records[index];
        slots[index] = Some(Verdict {
            question_num: record.question_num.clone(),
            question: string_field(&item, "question"),
            answer: record.answer.clone(),
            is_correct: bool_field(&item, "is_correct"),
            correct_answer: string_field(&item, "correct_answer"),
            explanation: string_field(&item, "explanation"),
            suggestion: string_field(&item, "suggestion"),
        });
    }

    let missing = slots.iter().filter(|slot| slot.is_none()).count();
    if missing > 0 {
        tracing::warn!("evaluator returned no verdict for {missing} of {} questions", records.len());
    }

    slots.into_iter().flatten().collect()
}

/// Normalize a question number for joining: `"Q1"`, `"question 01"` and `"1"` all
/// become `"1"`.
fn question_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let unlabeled = if lower.starts_with("question") {
        &trimmed["question".len()..]
    } else if lower.starts_with('q') {
        &trimmed[1..]
    } else {
        trimmed
    };
    let digits = unlabeled.trim().trim_start_matches('0');
    if digits.is_empty() && unlabeled.trim().starts_with('0') {
        "0".to_string()
    } else {
        digits.to_string()
    }
}

fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(question_key(s)),
        Value::Number(n) => Some(question_key(&n.to_string())),
        _ => None,
    }
}

fn string_field(item: &RawVerdict, field: &str) -> String {
    match item.get(field) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn bool_field(item: &RawVerdict, field: &str) -> bool {
    match item.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<QaRecord> {
        vec![
            QaRecord::new("1", "What is Rust?", "A language."),
            QaRecord::new("2", "What is Cargo?", "A package manager."),
        ]
    }

    #[test]
    fn prompt_lists_each_pair() {
        let prompt = build_evaluation_prompt(&records());
        assert!(prompt.starts_with("You are an expert evaluator."));
        assert!(prompt.contains("Q1: What is Rust?\nA1: A language.\n\n"));
        assert!(prompt.contains("Q2: What is Cargo?\nA2: A package manager.\n\n"));
    }

    #[test]
    fn parse_bare_array() {
        let items = parse_verdicts(r#"[{"question_num": "1", "is_correct": true}]"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn parse_fenced_array_with_prose() {
        let response = "Here is my analysis [see below]:\n\n```json\n[\n  {\"question_num\": \"1\", \"is_correct\": false}\n]\n```\nLet me know if you need more.";
        let items = parse_verdicts(response).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["is_correct"], Value::Bool(false));
    }

    #[test]
    fn parse_rejects_responses_without_objects() {
        assert!(parse_verdicts("I cannot grade this.").is_err());
        assert!(parse_verdicts("[]").is_err());
        assert!(parse_verdicts("[1, 2, 3]").is_err());
        let err = parse_verdicts("{\"question_num\": 1}").unwrap_err();
        assert!(err.to_string().contains("No valid JSON array"));
    }

    #[test]
    fn merge_joins_on_normalized_numbers() {
        let raw = parse_verdicts(
            r#"[
                {"question_num": "Q2", "question": "What is Cargo?", "answer": "rewritten", "is_correct": true},
                {"question_num": 1, "is_correct": "false", "explanation": "Too vague"}
            ]"#,
        )
        .unwrap();
        let verdicts = merge_verdicts(&records(), raw);

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].question_num, "1");
        assert!(!verdicts[0].is_correct);
        assert_eq!(verdicts[0].explanation, "Too vague");
        assert_eq!(verdicts[0].question, "");
        assert_eq!(verdicts[0].answer, "A language.");
        assert_eq!(verdicts[1].question_num, "2");
        assert!(verdicts[1].is_correct);
        assert_eq!(verdicts[1].answer, "A package manager.");
    }

    #[test]
    fn merge_drops_unknown_and_duplicate_verdicts() {
        let raw = parse_verdicts(
            r#"[
                {"question_num": "1", "is_correct": true},
                {"question_num": "1", "is_correct": false},
                {"question_num": "9", "is_correct": true},
                {"is_correct": true}
            ]"#,
        )
        .unwrap();
        let verdicts = merge_verdicts(&records(), raw);
        assert_eq!(verdicts.len(), 1);
        assert!(verdicts[0].is_correct);
    }

    #[test]
    fn merge_defaults_missing_fields() {
        let raw = parse_verdicts(r#"[{"question_num": "2"}]"#).unwrap();
        let verdict = &merge_verdicts(&records(), raw)[0];
        assert!(!verdict.is_correct);
        assert_eq!(verdict.correct_answer, "");
        assert_eq!(verdict.explanation, "");
        assert_eq!(verdict.suggestion, "");
    }

    #[test]
    fn merge_spreads_repeated_numbers_over_records() {
        let records = vec![
            QaRecord::new("1", "First?", "a"),
            QaRecord::new("1", "Renumbered?", "b"),
        ];
        let raw = parse_verdicts(
            r#"[{"question_num": "1", "is_correct": true}, {"question_num": "1", "is_correct": false}]"#,
        )
        .unwrap();
        let verdicts = merge_verdicts(&records, raw);
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].answer, "a");
        assert_eq!(verdicts[1].answer, "b");
    }

    #[test]
    fn question_keys() {
        assert_eq!(question_key("Q1"), "1");
        assert_eq!(question_key(" question 07 "), "7");
        assert_eq!(question_key("q0"), "0");
        assert_eq!(question_key("12"), "12");
    }
}
