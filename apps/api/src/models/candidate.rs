//! Candidate data models shared across the scoring pipeline.

use serde::{Deserialize, Serialize};

/// A candidate profile as produced by the upstream loader.
///
/// Records arrive already normalized and deduplicated; this service treats
/// them as immutable for the duration of a scoring run. Wire names keep the
/// loader's camelCase so request bodies pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    #[serde(rename = "jobTitle", default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub educations: Option<String>,
    #[serde(default)]
    pub experiences: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
}

/// A candidate with the score and highlights assigned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub name: String,
    /// 0–100. Out-of-range model output is clamped by the parser.
    pub score: u8,
    /// Short justification bullets. Empty when the model omits them.
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// Aggregate outcome of one scoring run.
///
/// Invariant: `scored_candidates.len()` never exceeds the input size, and a
/// candidate missing from `scored_candidates` is explained by an entry in
/// `errors` naming its batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringResult {
    pub scored_candidates: Vec<ScoredCandidate>,
    pub errors: Vec<String>,
}
