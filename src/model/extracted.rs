use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured analysis the model is asked to emit
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedAnalysis {
    #[schemars(description = "3-5 main findings or contributions of the work")]
    pub key_findings: Vec<String>,

    pub gaps: Vec<ExtractedGap>,

    #[schemars(description = "Limitations stated or implied by the abstract")]
    pub limitations: Vec<String>,

    #[schemars(description = "Gaps or weaknesses in the research methodology")]
    pub methodology_gaps: Vec<String>,

    #[schemars(description = "2-3 novel, testable hypotheses that address the gaps")]
    pub suggested_hypotheses: Vec<ExtractedHypothesis>,

    #[schemars(description = "3-5 concrete future research directions")]
    pub future_directions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedGap {
    #[schemars(description = "Specific description of the gap")]
    #[serde(default, alias = "description")]
    pub gap_description: Option<String>,

    #[schemars(description = "Confidence that this is a real gap, between 0.0 and 1.0")]
    #[serde(default)]
    pub confidence_score: Option<RawScore>,

    #[schemars(
        description = "One of: methodological, empirical, theoretical, data_availability, technical, conceptual, systematic, other"
    )]
    #[serde(default, alias = "type")]
    pub gap_type: Option<String>,

    #[schemars(description = "Potential impact of addressing this gap")]
    #[serde(default)]
    pub potential_impact: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedHypothesis {
    #[schemars(description = "The hypothesis statement")]
    #[serde(default, alias = "statement")]
    pub hypothesis: Option<String>,

    #[serde(default)]
    pub rationale: Option<String>,

    #[schemars(description = "Feasibility of testing the hypothesis, between 0.0 and 1.0")]
    #[serde(default)]
    pub feasibility_score: Option<RawScore>,

    #[schemars(
        description = "Research methods required; must be non-empty when feasibility is 0.3 or higher"
    )]
    #[serde(default, alias = "methods")]
    pub required_methods: Option<Vec<String>>,
}

/// A score as emitted by the model: models sometimes quote numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawScore {
    Number(f64),
    Text(String),
}

impl RawScore {
    /// Numeric value, if the score is a finite number or a numeric string
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            RawScore::Number(n) => *n,
            RawScore::Text(s) => {
                let s = s.trim();
                match s.strip_suffix('%') {
                    Some(percent) => percent.trim().parse::<f64>().ok()? / 100.0,
                    None => s.parse::<f64>().ok()?,
                }
            }
        };
        value.is_finite().then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_score_accepts_numbers_and_strings() {
        let n: RawScore = serde_json::from_str("0.75").unwrap();
        let s: RawScore = serde_json::from_str("\" 0.4 \"").unwrap();
        let pct: RawScore = serde_json::from_str("\"80%\"").unwrap();
        let bad: RawScore = serde_json::from_str("\"high\"").unwrap();

        assert_eq!(n.value(), Some(0.75));
        assert_eq!(s.value(), Some(0.4));
        assert_eq!(pct.value(), Some(0.8));
        assert_eq!(bad.value(), None);
    }

    #[test]
    fn test_schema_lists_every_section() {
        let schema = serde_json::to_string(&schemars::schema_for!(ExtractedAnalysis)).unwrap();
        for section in [
            "key_findings",
            "gaps",
            "limitations",
            "methodology_gaps",
            "suggested_hypotheses",
            "future_directions",
            "confidence_score",
            "feasibility_score",
            "required_methods",
        ] {
            assert!(schema.contains(section), "schema is missing {section}");
        }
    }

    #[test]
    fn test_schema_describes_every_gap_type() {
        let schema = serde_json::to_string(&schemars::schema_for!(ExtractedAnalysis)).unwrap();
        for gap_type in crate::model::GapType::ALL {
            assert!(schema.contains(gap_type.as_str()), "schema is missing {}", gap_type.as_str());
        }
    }
}
