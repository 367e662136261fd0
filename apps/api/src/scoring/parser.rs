//! Response Parser — pulls a validated JSON array of scored candidates out
//! of raw model output.
//!
//! Models wrap their answers in markdown fences, lead with prose, or leave
//! trailing commas; all of that is tolerated here. What is NOT tolerated:
//! no locatable array, or an array where nothing survives validation.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::candidate::ScoredCandidate;

#[derive(Debug, Error)]
pub enum ParserError {
    /// No JSON array could be located or decoded, or nothing in it had the
    /// scored-candidate shape. Retryable by re-asking the provider.
    #[error("no parseable scored-candidate array: {0}")]
    Parse(String),

    /// The array parsed but every entry referenced a candidate id outside
    /// the batch. Distinct from `Parse` so callers can tell a format failure
    /// from an id mixup.
    #[error("scored entries do not match the batch: {0}")]
    Validation(String),
}

/// Parses raw model output into the scored candidates for one batch.
///
/// Entries referencing ids outside `valid_ids` are dropped and the rest
/// kept (partial acceptance, logged, no error). Scores outside [0,100] are
/// clamped, never rejected. Missing highlights become an empty list.
pub fn parse_scored_candidates(
    raw: &str,
    valid_ids: &HashSet<String>,
) -> Result<Vec<ScoredCandidate>, ParserError> {
    let text = strip_json_fences(raw);
    let slice = extract_json_array(text)
        .ok_or_else(|| ParserError::Parse("no JSON array found in output".to_string()))?;

    let value: Value = serde_json::from_str(slice)
        .or_else(|_| serde_json::from_str(&strip_trailing_commas(slice)))
        .map_err(|e| ParserError::Parse(format!("array does not decode as JSON: {e}")))?;

    let elements = value
        .as_array()
        .ok_or_else(|| ParserError::Parse("located JSON is not an array".to_string()))?;

    let shaped: Vec<ScoredCandidate> = elements.iter().filter_map(to_scored_candidate).collect();
    if shaped.is_empty() {
        return Err(ParserError::Parse(format!(
            "zero of {} array entries have the scored-candidate shape",
            elements.len()
        )));
    }

    let (matched, unmatched): (Vec<_>, Vec<_>) = shaped
        .into_iter()
        .partition(|entry| valid_ids.contains(&entry.id));

    if matched.is_empty() {
        return Err(ParserError::Validation(format!(
            "all {} entries reference candidate ids outside the batch",
            unmatched.len()
        )));
    }

    if !unmatched.is_empty() {
        warn!(
            "Dropping {} scored entries with unknown candidate ids: {:?}",
            unmatched.len(),
            unmatched.iter().map(|e| e.id.as_str()).collect::<Vec<_>>()
        );
    }

    Ok(matched)
}

/// Converts one array element, or rejects it. Required: non-empty string id,
/// string name, numeric score. Highlights are optional.
fn to_scored_candidate(value: &Value) -> Option<ScoredCandidate> {
    let obj = value.as_object()?;

    let id = obj.get("id")?.as_str()?.trim();
    if id.is_empty() {
        return None;
    }
    let name = obj.get("name")?.as_str()?;

    let score_value = obj.get("score")?;
    let score = score_value
        .as_i64()
        .or_else(|| score_value.as_f64().map(|f| f.round() as i64))?;

    let highlights = obj
        .get("highlights")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ScoredCandidate {
        id: id.to_string(),
        name: name.to_string(),
        score: score.clamp(0, 100) as u8,
        highlights,
    })
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Returns the outermost `[...]` slice, skipping any surrounding prose.
/// Brackets inside string literals do not count toward nesting.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes commas that directly precede a closing `]` or `}` (a common model
/// slip that strict JSON rejects). String contents are left untouched.
fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const VALID_ARRAY: &str = r#"[
        {"id": "c1", "name": "Jane Doe", "score": 90, "highlights": ["Python expert"]},
        {"id": "c2", "name": "John Smith", "score": 30, "highlights": ["Frontend only"]}
    ]"#;

    #[test]
    fn test_valid_array_parses_all_entries_with_fields_preserved() {
        let scored = parse_scored_candidates(VALID_ARRAY, &ids(&["c1", "c2"])).unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].id, "c1");
        assert_eq!(scored[0].name, "Jane Doe");
        assert_eq!(scored[0].score, 90);
        assert_eq!(scored[0].highlights, vec!["Python expert".to_string()]);
        assert_eq!(scored[1].score, 30);
    }

    #[test]
    fn test_fenced_array_parses_identically_to_unfenced() {
        let fenced = format!("```json\n{VALID_ARRAY}\n```");
        let plain = parse_scored_candidates(VALID_ARRAY, &ids(&["c1", "c2"])).unwrap();
        let from_fence = parse_scored_candidates(&fenced, &ids(&["c1", "c2"])).unwrap();
        assert_eq!(plain, from_fence);
    }

    #[test]
    fn test_surrounding_prose_is_tolerated() {
        let noisy = format!(
            "Sure! Here are the scored candidates:\n{VALID_ARRAY}\nLet me know if you need more."
        );
        let scored = parse_scored_candidates(&noisy, &ids(&["c1", "c2"])).unwrap();
        assert_eq!(scored.len(), 2);
    }

    #[test]
    fn test_trailing_commas_are_tolerated() {
        let raw = r#"[
            {"id": "c1", "name": "Jane Doe", "score": 75, "highlights": ["Solid match",],},
        ]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1"])).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 75);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped_not_rejected() {
        let raw = r#"[
            {"id": "c1", "name": "A", "score": 150, "highlights": []},
            {"id": "c2", "name": "B", "score": -5, "highlights": []}
        ]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1", "c2"])).unwrap();
        assert_eq!(scored[0].score, 100);
        assert_eq!(scored[1].score, 0);
    }

    #[test]
    fn test_missing_highlights_default_to_empty() {
        let raw = r#"[{"id": "c1", "name": "A", "score": 50}]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1"])).unwrap();
        assert!(scored[0].highlights.is_empty());
    }

    #[test]
    fn test_unknown_id_entries_dropped_survivors_kept() {
        let raw = r#"[
            {"id": "c1", "name": "A", "score": 80, "highlights": []},
            {"id": "ghost", "name": "Nobody", "score": 99, "highlights": []}
        ]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1", "c2"])).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].id, "c1");
    }

    #[test]
    fn test_all_unknown_ids_is_validation_error() {
        let raw = r#"[{"id": "ghost", "name": "Nobody", "score": 99, "highlights": []}]"#;
        let err = parse_scored_candidates(raw, &ids(&["c1"])).err().unwrap();
        assert!(matches!(err, ParserError::Validation(_)));
    }

    #[test]
    fn test_no_array_at_all_is_parse_error() {
        let err = parse_scored_candidates("I cannot score these candidates.", &ids(&["c1"]))
            .err()
            .unwrap();
        assert!(matches!(err, ParserError::Parse(_)));
    }

    #[test]
    fn test_empty_array_is_parse_error() {
        let err = parse_scored_candidates("[]", &ids(&["c1"])).err().unwrap();
        assert!(matches!(err, ParserError::Parse(_)));
    }

    #[test]
    fn test_entries_missing_score_are_dropped() {
        let raw = r#"[
            {"id": "c1", "name": "A"},
            {"id": "c2", "name": "B", "score": 70}
        ]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1", "c2"])).unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].id, "c2");
    }

    #[test]
    fn test_float_scores_are_rounded() {
        let raw = r#"[{"id": "c1", "name": "A", "score": 82.6}]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1"])).unwrap();
        assert_eq!(scored[0].score, 83);
    }

    #[test]
    fn test_brackets_inside_strings_do_not_break_extraction() {
        let raw = r#"[{"id": "c1", "name": "A [senior]", "score": 60, "highlights": ["Listed [1] project"]}]"#;
        let scored = parse_scored_candidates(raw, &ids(&["c1"])).unwrap();
        assert_eq!(scored[0].name, "A [senior]");
    }

    #[test]
    fn test_strip_json_fences_variants() {
        assert_eq!(
            strip_json_fences("```json\n[1]\n```"),
            "[1]"
        );
        assert_eq!(strip_json_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_json_fences("[1]"), "[1]");
    }
}
