//! Prompt Builder — assembles the per-batch scoring prompt.
//!
//! Pure functions of their inputs. The builder never truncates: when a
//! batch's serialized form would blow the prompt budget, the orchestrator
//! shrinks the batch instead.

use tracing::error;

use crate::models::candidate::Candidate;
use crate::scoring::prompts::{
    FEW_SHOT_INPUT, FEW_SHOT_OUTPUT, RETRY_PROMPT_TEMPLATE, SCORING_PROMPT_TEMPLATE,
};

/// Serializes a batch into the pretty JSON list embedded in the prompt.
/// `Candidate` carries exactly the fields relevant to scoring, so the wire
/// form is the prompt form.
pub fn format_candidates_for_prompt(batch: &[Candidate]) -> String {
    match serde_json::to_string_pretty(batch) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize candidate batch for prompt: {e}");
            "[]".to_string()
        }
    }
}

/// Builds the strict first-attempt prompt: few-shot example transcript
/// followed by the real job description and candidate batch.
pub fn build_scoring_prompt(job_description: &str, batch: &[Candidate]) -> String {
    let task = fill_template(SCORING_PROMPT_TEMPLATE, job_description, batch);
    format!("EXAMPLE INPUT:\n{FEW_SHOT_INPUT}\n\nEXAMPLE OUTPUT:\n{FEW_SHOT_OUTPUT}\n\n{task}")
}

/// Builds the softened re-ask prompt used after a parse failure.
/// No few-shot transcript; the relaxed wording alone changes the answer.
pub fn build_retry_prompt(job_description: &str, batch: &[Candidate]) -> String {
    fill_template(RETRY_PROMPT_TEMPLATE, job_description, batch)
}

fn fill_template(template: &str, job_description: &str, batch: &[Candidate]) -> String {
    template
        .replace("{job_description}", job_description)
        .replace("{candidates_json}", &format_candidates_for_prompt(batch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candidate(id: &str, name: &str, skills: Option<&str>) -> Candidate {
        Candidate {
            id: id.to_string(),
            name: name.to_string(),
            job_title: None,
            headline: None,
            summary: None,
            keywords: None,
            educations: None,
            experiences: None,
            skills: skills.map(str::to_string),
        }
    }

    #[test]
    fn test_format_candidates_empty_batch_is_empty_list() {
        assert_eq!(format_candidates_for_prompt(&[]), "[]");
    }

    #[test]
    fn test_format_candidates_uses_camel_case_wire_names() {
        let mut candidate = make_candidate("c1", "Test User", Some("Python, JS"));
        candidate.job_title = Some("Developer".to_string());
        let json = format_candidates_for_prompt(&[candidate]);
        assert!(json.contains(r#""jobTitle": "Developer""#));
        assert!(json.contains(r#""skills": "Python, JS""#));
        assert!(!json.contains("job_title"));
    }

    #[test]
    fn test_scoring_prompt_embeds_jd_and_batch() {
        let batch = vec![
            make_candidate("c1", "Candidate One", Some("Python, API")),
            make_candidate("c2", "Candidate Two", Some("Java")),
        ];
        let prompt = build_scoring_prompt("Senior backend engineer, Python, AWS", &batch);
        assert!(prompt.contains("Senior backend engineer, Python, AWS"));
        assert!(prompt.contains("Candidate One"));
        assert!(prompt.contains("Candidate Two"));
    }

    #[test]
    fn test_scoring_prompt_carries_few_shot_transcript() {
        let prompt = build_scoring_prompt("Any role", &[]);
        assert!(prompt.contains("EXAMPLE INPUT:"));
        assert!(prompt.contains("EXAMPLE OUTPUT:"));
        assert!(prompt.contains("Jane Doe"));
        // Strict format block survives the splice
        assert!(prompt.contains(r#""score": <0-100>"#));
    }

    #[test]
    fn test_retry_prompt_drops_few_shots_and_format_block() {
        let batch = vec![make_candidate("c1", "Candidate One", None)];
        let prompt = build_retry_prompt("Any role", &batch);
        assert!(!prompt.contains("EXAMPLE INPUT:"));
        assert!(!prompt.contains("<0-100>"));
        assert!(prompt.contains("Candidate One"));
    }

    #[test]
    fn test_prompt_is_pure_same_inputs_same_output() {
        let batch = vec![make_candidate("c1", "Candidate One", Some("Rust"))];
        let a = build_scoring_prompt("Rust engineer", &batch);
        let b = build_scoring_prompt("Rust engineer", &batch);
        assert_eq!(a, b);
    }
}
