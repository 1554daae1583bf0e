//! Wire and domain types for single-abstract analysis

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Field tag used when the caller does not provide one
pub const DEFAULT_FIELD: &str = "general";

fn default_field() -> String {
    DEFAULT_FIELD.to_string()
}

/// Request to analyze one abstract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    /// Title of the research paper
    pub title: String,
    /// Abstract or text content to analyze
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Research field tag used to select prompt framing (e.g. "medicine")
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

impl AnalysisRequest {
    pub fn new(
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            abstract_text: abstract_text.into(),
            field: field.into(),
            authors: None,
            keywords: None,
        }
    }

    /// Validation applied at the HTTP boundary
    ///
    /// The prompt builder re-checks abstract and field; the title is only
    /// required for caller-submitted requests.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if self.abstract_text.trim().is_empty() {
            return Err("abstract cannot be empty".to_string());
        }
        if self.field.trim().is_empty() {
            return Err("field cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Category of a research gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    Methodological,
    Empirical,
    Theoretical,
    DataAvailability,
    Technical,
    Conceptual,
    Systematic,
    Other,
}

impl GapType {
    pub const ALL: [GapType; 8] = [
        GapType::Methodological,
        GapType::Empirical,
        GapType::Theoretical,
        GapType::DataAvailability,
        GapType::Technical,
        GapType::Conceptual,
        GapType::Systematic,
        GapType::Other,
    ];

    /// Normalize a free-form label emitted by the model
    ///
    /// Returns `None` for blank labels. Unrecognized labels map to `Other`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
            .collect();
        let normalized = normalized.trim_matches('_');
        if normalized.is_empty() {
            return None;
        }
        let normalized = normalized.strip_suffix("_gap").unwrap_or(normalized);

        let gap_type = match normalized {
            "methodological" | "methodology" | "method" => GapType::Methodological,
            "empirical" | "evidence" | "experimental" => GapType::Empirical,
            "theoretical" | "theory" => GapType::Theoretical,
            "data_availability" | "data" | "data_related" | "dataset" => {
                GapType::DataAvailability
            }
            "technical" | "technological" => GapType::Technical,
            "conceptual" => GapType::Conceptual,
            "systematic" | "systemic" => GapType::Systematic,
            _ => GapType::Other,
        };
        Some(gap_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GapType::Methodological => "methodological",
            GapType::Empirical => "empirical",
            GapType::Theoretical => "theoretical",
            GapType::DataAvailability => "data_availability",
            GapType::Technical => "technical",
            GapType::Conceptual => "conceptual",
            GapType::Systematic => "systematic",
            GapType::Other => "other",
        }
    }
}

/// A deficiency or unaddressed question identified in the analyzed research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResearchGap {
    pub gap_description: String,
    /// Always within [0, 1]
    pub confidence_score: f64,
    pub gap_type: GapType,
    pub potential_impact: String,
}

/// A testable follow-up proposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Hypothesis {
    pub hypothesis: String,
    pub rationale: String,
    /// Always within [0, 1]
    pub feasibility_score: f64,
    #[serde(default)]
    pub required_methods: Vec<String>,
}

/// Structured analysis of one abstract
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    pub key_findings: Vec<String>,
    pub gaps: Vec<ResearchGap>,
    #[serde(rename = "suggested_hypotheses")]
    pub hypotheses: Vec<Hypothesis>,
    pub limitations: Vec<String>,
    pub methodology_gaps: Vec<String>,
    pub future_directions: Vec<String>,
    /// Wall-clock seconds spent producing this result
    pub processing_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            key_findings: vec!["Mindfulness reduced reported stress".to_string()],
            gaps: vec![ResearchGap {
                gap_description: "No follow-up beyond eight weeks".to_string(),
                confidence_score: 0.85,
                gap_type: GapType::DataAvailability,
                potential_impact: "Durability of the effect is unknown".to_string(),
            }],
            hypotheses: vec![Hypothesis {
                hypothesis: "Effects persist at twelve months".to_string(),
                rationale: "Habit formation literature".to_string(),
                feasibility_score: 0.6,
                required_methods: vec!["Longitudinal cohort".to_string()],
            }],
            limitations: vec!["Small sample".to_string()],
            methodology_gaps: vec!["No active control".to_string()],
            future_directions: vec!["Multi-site replication".to_string()],
            processing_time: 1.25,
        }
    }

    #[test]
    fn test_wire_roundtrip() {
        let result = sample_result();
        let json = serde_json::to_string(&result).unwrap();
        let parsed: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample_result()).unwrap();
        assert!(value.get("suggested_hypotheses").is_some());
        assert!(value.get("hypotheses").is_none());
        assert_eq!(value["gaps"][0]["gap_type"], "data_availability");
        assert_eq!(value["gaps"][0]["gap_description"], "No follow-up beyond eight weeks");
        assert_eq!(
            value["suggested_hypotheses"][0]["required_methods"][0],
            "Longitudinal cohort"
        );
    }

    #[test]
    fn test_request_defaults_field() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"title": "T", "abstract": "Body"}"#).unwrap();
        assert_eq!(request.field, "general");
        assert_eq!(request.abstract_text, "Body");
        assert!(request.authors.is_none());
    }

    #[test]
    fn test_request_validation() {
        assert!(AnalysisRequest::new("T", "Body", "medicine").validate().is_ok());
        assert!(AnalysisRequest::new("T", "   ", "medicine").validate().is_err());
        assert!(AnalysisRequest::new(" ", "Body", "medicine").validate().is_err());
        assert!(AnalysisRequest::new("T", "Body", "").validate().is_err());
    }

    #[test]
    fn test_gap_type_labels() {
        assert_eq!(GapType::from_label("Methodological"), Some(GapType::Methodological));
        assert_eq!(GapType::from_label("data-availability"), Some(GapType::DataAvailability));
        assert_eq!(GapType::from_label("Data availability gap"), Some(GapType::DataAvailability));
        assert_eq!(GapType::from_label(" theoretical "), Some(GapType::Theoretical));
        assert_eq!(GapType::from_label("ethical"), Some(GapType::Other));
        assert_eq!(GapType::from_label("  "), None);
    }

    #[test]
    fn test_every_wire_tag_parses_back() {
        for gap_type in GapType::ALL {
            assert_eq!(GapType::from_label(gap_type.as_str()), Some(gap_type));
            assert_eq!(
                serde_json::to_value(gap_type).unwrap(),
                serde_json::Value::from(gap_type.as_str())
            );
        }
    }
}
