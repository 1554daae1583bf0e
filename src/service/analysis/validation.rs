//! Validating decode of raw model output
//!
//! The model is asked for a single JSON object, but real output drifts: it
//! may be wrapped in prose or markdown fences, quote numeric scores, emit
//! out-of-range scores, or leave out fields. This module locates the
//! structured payload, decodes each section strictly, and repairs what is
//! locally recoverable (clamped scores, dropped incomplete entries) while
//! recording every repair in a [`ValidationReport`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::extracted::{ExtractedGap, ExtractedHypothesis, RawScore};
use crate::model::{AnalysisResult, GapType, Hypothesis, ResearchGap};

/// Hypotheses at or above this feasibility must name their required methods
pub const LOW_FEASIBILITY_THRESHOLD: f64 = 0.3;

const SECTIONS: &[&str] = &[
    "key_findings",
    "gaps",
    "limitations",
    "methodology_gaps",
    "suggested_hypotheses",
    "future_directions",
];

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Model output that is not structurally recoverable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("model returned empty output")]
    EmptyOutput,

    #[error("no JSON object found in model output")]
    NoStructuredPayload,

    #[error("invalid JSON in model output: {0}")]
    InvalidJson(String),

    #[error("model output is JSON but not an object")]
    NotAnObject,

    #[error("model output contains none of the expected sections")]
    MissingSections,

    #[error("section '{section}' must be an array, found {found}")]
    InvalidSection { section: String, found: String },
}

/// Repairs applied while decoding model output
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
    pub clamped_scores: usize,
    pub dropped_gaps: usize,
    pub dropped_hypotheses: usize,
}

impl ValidationReport {
    fn warn(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Whether any repair was applied
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A decoded analysis plus the repairs made to obtain it
#[derive(Debug, Clone)]
pub struct ParsedAnalysis {
    pub result: AnalysisResult,
    pub report: ValidationReport,
}

/// Clamp a score into [0, 1]
pub fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Decode raw model output into a validated [`AnalysisResult`]
///
/// `processing_time` is left at zero; the caller stamps it.
pub fn parse_analysis(raw: &str) -> Result<ParsedAnalysis, ParseError> {
    let payload = extract_payload(raw)?;

    if !SECTIONS.iter().any(|section| payload.contains_key(*section)) {
        return Err(ParseError::MissingSections);
    }

    let mut report = ValidationReport::default();
    for section in SECTIONS {
        if !payload.contains_key(*section) {
            report.warn(format!("section '{}' missing, treated as empty", section));
        }
    }

    let key_findings = string_list(&payload, "key_findings", &mut report)?;
    let limitations = string_list(&payload, "limitations", &mut report)?;
    let methodology_gaps = string_list(&payload, "methodology_gaps", &mut report)?;
    let future_directions = string_list(&payload, "future_directions", &mut report)?;

    let gaps = section_entries(&payload, "gaps")?
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| validate_gap(i, entry, &mut report))
        .collect();

    let hypotheses = section_entries(&payload, "suggested_hypotheses")?
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| validate_hypothesis(i, entry, &mut report))
        .collect();

    Ok(ParsedAnalysis {
        result: AnalysisResult {
            key_findings,
            gaps,
            hypotheses,
            limitations,
            methodology_gaps,
            future_directions,
            processing_time: 0.0,
        },
        report,
    })
}

/// Locate the JSON object in model output
///
/// Tries the whole text, then each fenced code block, then the first JSON
/// value starting at each `{`. Text after a decoded value is ignored, so
/// trailing commentary may contain braces of its own.
fn extract_payload(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::EmptyOutput);
    }

    let mut candidates: Vec<&str> = vec![text];
    candidates.extend(
        FENCED_BLOCK
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|block| !block.is_empty()),
    );

    let mut last_error: Option<ParseError> = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => {
                if last_error.is_none() {
                    last_error = Some(ParseError::NotAnObject);
                }
            }
            Err(e) => {
                // Prose is not a failed JSON attempt
                if candidate.starts_with('{') || candidate.starts_with('[') {
                    last_error = Some(ParseError::InvalidJson(e.to_string()));
                }
            }
        }
    }

    // An object carrying a known section wins over any earlier object
    let mut first_object: Option<Map<String, Value>> = None;
    let mut first_error: Option<ParseError> = None;
    for (start, _) in text.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(map))) => {
                if SECTIONS.iter().any(|section| map.contains_key(*section)) {
                    return Ok(map);
                }
                first_object.get_or_insert(map);
            }
            Some(Err(e)) => {
                first_error.get_or_insert(ParseError::InvalidJson(e.to_string()));
            }
            _ => {}
        }
    }

    if let Some(map) = first_object {
        return Ok(map);
    }
    Err(first_error
        .or(last_error)
        .unwrap_or(ParseError::NoStructuredPayload))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Entries of an array section; absent or null sections are empty
fn section_entries<'a>(
    payload: &'a Map<String, Value>,
    section: &str,
) -> Result<&'a [Value], ParseError> {
    match payload.get(section) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ParseError::InvalidSection {
            section: section.to_string(),
            found: json_type_name(other).to_string(),
        }),
    }
}

/// Non-blank trimmed strings of a list section
fn string_list(
    payload: &Map<String, Value>,
    section: &str,
    report: &mut ValidationReport,
) -> Result<Vec<String>, ParseError> {
    let mut items = Vec::new();
    for (i, entry) in section_entries(payload, section)?.iter().enumerate() {
        match entry {
            Value::String(s) if !s.trim().is_empty() => items.push(s.trim().to_string()),
            Value::String(_) => report.warn(format!("{}[{}] is blank, dropped", section, i)),
            other => report.warn(format!(
                "{}[{}] is a {}, not a string, dropped",
                section,
                i,
                json_type_name(other)
            )),
        }
    }
    Ok(items)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve a raw score to [0, 1], recording missing and out-of-range values
fn resolve_score(
    raw: Option<&RawScore>,
    label: &str,
    report: &mut ValidationReport,
) -> f64 {
    let Some(value) = raw.and_then(RawScore::value) else {
        report.warn(format!("{} missing or not numeric, defaulted to 0.0", label));
        return 0.0;
    };

    let clamped = clamp_score(value);
    if clamped != value {
        report.clamped_scores += 1;
        report.warn(format!("{} {} clamped to {}", label, value, clamped));
    }
    clamped
}

fn validate_gap(index: usize, entry: &Value, report: &mut ValidationReport) -> Option<ResearchGap> {
    let gap: ExtractedGap = match serde_json::from_value(entry.clone()) {
        Ok(gap) => gap,
        Err(e) => {
            report.dropped_gaps += 1;
            report.warn(format!("gaps[{}] malformed ({}), dropped", index, e));
            return None;
        }
    };

    let Some(gap_description) = non_blank(gap.gap_description) else {
        report.dropped_gaps += 1;
        report.warn(format!("gaps[{}] has no description, dropped", index));
        return None;
    };

    let Some(gap_type) = gap.gap_type.as_deref().and_then(GapType::from_label) else {
        report.dropped_gaps += 1;
        report.warn(format!("gaps[{}] has no gap type, dropped", index));
        return None;
    };

    let confidence_score = resolve_score(
        gap.confidence_score.as_ref(),
        &format!("gaps[{}].confidence_score", index),
        report,
    );

    Some(ResearchGap {
        gap_description,
        confidence_score,
        gap_type,
        potential_impact: non_blank(gap.potential_impact).unwrap_or_default(),
    })
}

fn validate_hypothesis(
    index: usize,
    entry: &Value,
    report: &mut ValidationReport,
) -> Option<Hypothesis> {
    let hypothesis: ExtractedHypothesis = match serde_json::from_value(entry.clone()) {
        Ok(hypothesis) => hypothesis,
        Err(e) => {
            report.dropped_hypotheses += 1;
            report.warn(format!(
                "suggested_hypotheses[{}] malformed ({}), dropped",
                index, e
            ));
            return None;
        }
    };

    let Some(statement) = non_blank(hypothesis.hypothesis) else {
        report.dropped_hypotheses += 1;
        report.warn(format!(
            "suggested_hypotheses[{}] has no statement, dropped",
            index
        ));
        return None;
    };

    let feasibility_score = resolve_score(
        hypothesis.feasibility_score.as_ref(),
        &format!("suggested_hypotheses[{}].feasibility_score", index),
        report,
    );

    let required_methods: Vec<String> = hypothesis
        .required_methods
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| non_blank(Some(m)))
        .collect();

    if feasibility_score >= LOW_FEASIBILITY_THRESHOLD && required_methods.is_empty() {
        report.dropped_hypotheses += 1;
        report.warn(format!(
            "suggested_hypotheses[{}] has feasibility {} but no required methods, dropped",
            index, feasibility_score
        ));
        return None;
    }

    Some(Hypothesis {
        hypothesis: statement,
        rationale: non_blank(hypothesis.rationale).unwrap_or_default(),
        feasibility_score,
        required_methods,
    })
}
