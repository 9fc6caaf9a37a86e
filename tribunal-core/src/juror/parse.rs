//! Parsing LLM juror replies into raw judgments.
//!
//! The expected reply is a JSON object with an `evaluations` array, usually
//! inside a fenced ```json block. Range checks happen later in
//! [`super::validate_judgment`]; this module only extracts structure.

use super::RawJudgment;
use crate::config::CriterionConfig;
use crate::error::JurorError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").ok());

/// Parse a juror reply.
///
/// Criterion keys written as `Prefix.name` are matched to `name`, and keys
/// are matched case-insensitively against the configured criteria. Scores
/// may be `{"score": .., "explanation": ..}` objects or bare values.
pub fn parse_judgment(text: &str, criteria: &[CriterionConfig]) -> Result<RawJudgment, JurorError> {
    let document = extract_json(text)
        .ok_or_else(|| JurorError::malformed("reply does not contain a JSON object"))?;
    let evaluations = document
        .get("evaluations")
        .and_then(Value::as_array)
        .ok_or_else(|| JurorError::malformed("reply JSON has no 'evaluations' array"))?;

    let mut judgment = RawJudgment::new();
    let mut comments = Vec::new();
    for item in evaluations {
        let Some(response_id) = item.get("response_id").and_then(id_string) else {
            continue;
        };

        if let Some(scores) = item.get("scores").and_then(Value::as_object) {
            for (key, entry) in scores {
                let criterion = normalize_criterion(key, criteria);
                let (score, note) = match entry {
                    Value::Object(obj) => (
                        obj.get("score").cloned().unwrap_or(Value::Null),
                        obj.get("explanation").and_then(Value::as_str),
                    ),
                    bare => (bare.clone(), None),
                };
                judgment = judgment.score(response_id.clone(), criterion.clone(), score);
                if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
                    judgment = judgment.explain(response_id.clone(), criterion, note);
                }
            }
        }

        if let Some(comment) = item
            .get("overall_comment")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
        {
            comments.push(format!("[{response_id}] {}", comment.trim()));
        }
    }

    if !comments.is_empty() {
        judgment = judgment.with_explanation(comments.join("\n"));
    }
    Ok(judgment)
}

/// Find the first JSON object in a fenced block, or failing that, in the raw text.
fn extract_json(text: &str) -> Option<Value> {
    if let Some(re) = FENCED_BLOCK.as_ref() {
        for caps in re.captures_iter(text) {
            if let Some(value) = caps.get(1).and_then(|m| first_object(m.as_str())) {
                return Some(value);
            }
        }
    }
    first_object(text)
}

/// Deserialize the first JSON object starting at any `{`.
fn first_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => Some(value),
            _ => None,
        }
    })
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_criterion(key: &str, criteria: &[CriterionConfig]) -> String {
    let key = key.trim();
    let find = |candidate: &str| {
        criteria
            .iter()
            .find(|c| c.name == candidate)
            .or_else(|| criteria.iter().find(|c| c.name.eq_ignore_ascii_case(candidate)))
            .map(|c| c.name.clone())
    };
    find(key)
        .or_else(|| key.rsplit_once('.').and_then(|(_, suffix)| find(suffix)))
        .unwrap_or_else(|| key.to_string())
}
