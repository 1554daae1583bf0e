//! Prompts for abstract analysis

use crate::model::{AnalysisRequest, GapType};
use crate::model::extracted::ExtractedAnalysis;
use crate::service::analysis::AnalysisError;

/// Abstracts beyond this many characters are truncated before prompting
const MAX_ABSTRACT_CHARS: usize = 12_000;

/// System prompt for abstract analysis
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a research assistant specializing in identifying gaps, limitations, and future research directions in scientific papers.

## Rules

1. Base every finding, gap, and limitation on the provided abstract. Do not invent results the abstract does not report.
2. Be specific and actionable. Generic statements such as "more research is needed" are not gaps.
3. Scores are probabilities between 0.0 and 1.0:
   - confidence_score: how confident you are that the gap is real given the abstract
   - feasibility_score: how feasible it is to test the hypothesis with current methods
4. Every hypothesis with a feasibility_score of 0.3 or higher must list the research methods required to test it.
5. Return an empty gaps array if the abstract exhibits no meaningful gaps.

Your output must be a single JSON object conforming to the requested schema. Do not wrap it in prose."#;

/// Domain framing for a research field tag
///
/// Unknown tags fall back to a generic research-analysis frame.
pub fn field_context(field: &str) -> &'static str {
    let normalized: String = field
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect();

    match normalized.as_str() {
        "neuroscience" => {
            "Neuroscience research. Pay attention to sample sizes, species and model organisms, imaging and recording modalities, causal versus correlational claims, and translation from animal models to humans."
        }
        "computer_science" => {
            "Computer science research. Pay attention to benchmark and dataset choice, baselines, reproducibility, scalability, threats to validity, and generalization beyond the evaluated setting."
        }
        "biology" => {
            "Biology research. Pay attention to model systems, in vitro versus in vivo evidence, mechanistic depth, replication, and ecological or evolutionary context."
        }
        "physics" => {
            "Physics research. Pay attention to experimental precision, theoretical assumptions, approximations, parameter regimes, and agreement between theory and measurement."
        }
        "chemistry" => {
            "Chemistry research. Pay attention to reaction conditions, yields, characterization methods, mechanistic evidence, scalability, and safety or environmental considerations."
        }
        "medicine" => {
            "Medical research. Pay attention to study design, cohort size and diversity, controls and blinding, follow-up duration, clinical endpoints, and ethical constraints."
        }
        "psychology" => {
            "Psychology research. Pay attention to sampling and demographics, measurement validity, self-report bias, effect sizes, preregistration, and replication."
        }
        "mathematics" => {
            "Mathematics research. Pay attention to the generality of assumptions, open cases, constructive versus existential results, and connections to related problems."
        }
        _ => {
            "General scientific research. Pay attention to study design, evidence quality, scope of the claims, and what the work leaves unaddressed."
        }
    }
}

/// Gap type tags offered to the model
fn gap_type_list() -> String {
    GapType::ALL
        .iter()
        .map(GapType::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// JSON Schema of the expected response
fn response_schema() -> String {
    let schema = schemars::schema_for!(ExtractedAnalysis);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Truncate on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the analysis prompt for a request
pub fn build_analysis_prompt(request: &AnalysisRequest) -> Result<String, AnalysisError> {
    let abstract_text = request.abstract_text.trim();
    if abstract_text.is_empty() {
        return Err(AnalysisError::InvalidRequest(
            "abstract cannot be empty".to_string(),
        ));
    }
    let field = request.field.trim();
    if field.is_empty() {
        return Err(AnalysisError::InvalidRequest(
            "field cannot be empty".to_string(),
        ));
    }

    let abstract_text = truncate_chars(abstract_text, MAX_ABSTRACT_CHARS);

    let authors = match request.authors.as_deref() {
        Some(authors) if !authors.is_empty() => format!("- Authors: {}\n", authors.join(", ")),
        _ => String::new(),
    };
    let keywords = match request.keywords.as_deref() {
        Some(keywords) if !keywords.is_empty() => {
            format!("- Keywords: {}\n", keywords.join(", "))
        }
        _ => String::new(),
    };

    Ok(format!(
        r#"Analyze the following research paper for gaps, limitations, and follow-up hypotheses.

## Field Context
{field_context}

## Paper Information
- Title: {title}
- Field: {field}
{authors}{keywords}
## Abstract

{abstract_text}

---

Produce the following sections:

1. key_findings: 3-5 main findings or contributions of this work.
2. gaps: specific research gaps. For each gap give
   - gap_description
   - gap_type: {gap_types}
   - confidence_score between 0.0 and 1.0
   - potential_impact of addressing the gap
3. limitations: limitations stated or implied in the research.
4. methodology_gaps: gaps or issues in the research methodology.
5. future_directions: 3-5 concrete future research directions.
6. suggested_hypotheses: 2-3 novel hypotheses based on the gaps. For each hypothesis give
   - hypothesis: the statement
   - rationale
   - feasibility_score between 0.0 and 1.0
   - required_methods: ordered list of research methods

## Response JSON Schema

{schema}

Output a single JSON object only."#,
        field_context = field_context(field),
        gap_types = gap_type_list(),
        title = request.title.trim(),
        field = field,
        authors = authors,
        keywords = keywords,
        abstract_text = abstract_text,
        schema = response_schema(),
    ))
}
